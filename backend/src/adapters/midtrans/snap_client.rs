//! Midtrans Snap checkout client.
//!
//! Implements the `PaymentGateway` port against the Snap transactions API.
//! One client is built at bootstrap and shared by every request.
//!
//! # Security
//!
//! - Server key sent as HTTP basic auth username, never logged
//! - Secrets handled via `secrecy::SecretString`

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::payment::GatewayProvider;
use crate::ports::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};

/// Sandbox Snap host.
pub const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";

/// Production Snap host.
pub const PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Midtrans API configuration.
#[derive(Clone)]
pub struct MidtransConfig {
    server_key: SecretString,
    api_base_url: String,
}

impl MidtransConfig {
    pub fn new(server_key: SecretString, api_base_url: impl Into<String>) -> Self {
        Self {
            server_key,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

impl std::fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Snap API client.
pub struct MidtransSnapClient {
    config: MidtransConfig,
    http_client: reqwest::Client,
}

impl MidtransSnapClient {
    pub fn new(config: MidtransConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn transactions_url(&self) -> String {
        format!("{}/snap/v1/transactions", self.config.api_base_url)
    }
}

#[derive(Debug, Serialize)]
struct SnapTransactionRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    item_details: Vec<ItemDetail<'a>>,
    expiry: Expiry,
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct ItemDetail<'a> {
    id: &'a str,
    price: i64,
    quantity: u32,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Expiry {
    unit: &'static str,
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    #[serde(default)]
    redirect_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}

impl<'a> SnapTransactionRequest<'a> {
    fn from_request(request: &'a CheckoutRequest) -> Self {
        Self {
            transaction_details: TransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.gross_amount,
            },
            item_details: vec![ItemDetail {
                id: &request.order_id,
                price: request.gross_amount,
                quantity: 1,
                name: &request.item_label,
            }],
            expiry: Expiry {
                unit: "minutes",
                duration: request.expiry_minutes,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransSnapClient {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Midtrans
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = SnapTransactionRequest::from_request(&request);

        let response = self
            .http_client
            .post(self.transactions_url())
            .basic_auth(self.config.server_key.expose_secret(), Some(""))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let messages = serde_json::from_str::<SnapErrorResponse>(&error_text)
                .map(|e| e.error_messages.join("; "))
                .unwrap_or_default();
            let message = if messages.is_empty() { error_text } else { messages };
            tracing::error!(
                order_id = %request.order_id,
                status = status.as_u16(),
                error = %message,
                "Snap create transaction failed"
            );

            let err = match status {
                reqwest::StatusCode::UNAUTHORIZED => GatewayError::authentication(message),
                s if s.is_client_error() => GatewayError::rejected(message),
                _ => GatewayError::provider(message),
            };
            return Err(err.with_provider_code(status.as_u16().to_string()));
        }

        let snap: SnapTransactionResponse = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Snap response: {}", e))
        })?;

        Ok(CheckoutSession {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }
}
