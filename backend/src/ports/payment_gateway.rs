//! Payment gateway port for hosted checkout.
//!
//! Defines the contract for requesting a checkout token from an external
//! gateway (e.g., Midtrans Snap). Collection itself happens on the gateway's
//! hosted page; results come back through the webhook.
//!
//! # Design
//!
//! - **One client per process**: built at bootstrap and injected
//! - **Order id is the idempotency key**: the gateway rejects reuse

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::payment::{GatewayProvider, PaymentError};

/// Port for checkout-token requests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Which provider this client talks to.
    fn provider(&self) -> GatewayProvider;

    /// Request a checkout token for an order.
    async fn create_checkout(&self, request: CheckoutRequest)
        -> Result<CheckoutSession, GatewayError>;
}

/// Request for a hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Merchant order id; the payment's `external_id`.
    pub order_id: String,

    /// Amount in minor units.
    pub gross_amount: i64,

    /// Currency code.
    pub currency: String,

    /// Minutes until the checkout page expires.
    pub expiry_minutes: i64,

    /// Payment display number, shown on the gateway page.
    pub item_label: String,
}

/// Hosted checkout handed back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Token for embedding the checkout.
    pub token: String,

    /// URL for the payer to complete checkout.
    pub redirect_url: Option<String>,
}

/// Error talking to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's status code or error id (if available).
    pub provider_code: Option<String>,

    /// Whether the request can be retried.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthenticationError, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::RequestRejected, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        PaymentError::gateway(err.to_string())
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,

    /// Server key rejected.
    AuthenticationError,

    /// Gateway refused the request (duplicate order id, bad amount, ...).
    RequestRejected,

    /// Gateway-side failure or unreadable response.
    ProviderError,
}

impl GatewayErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayErrorCode::NetworkError | GatewayErrorCode::ProviderError)
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::RequestRejected => "request_rejected",
            GatewayErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
