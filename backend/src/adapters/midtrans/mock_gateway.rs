//! Mock payment gateway for testing and local runs.
//!
//! Supports:
//! - Deterministic tokens derived from the order id
//! - Error injection
//! - Call tracking

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::payment::GatewayProvider;
use crate::ports::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};

/// Mock gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.fail_next(GatewayError::network("timeout")).await;
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_error: Option<GatewayError>,
    requests: Vec<CheckoutRequest>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call fails with `error`.
    pub async fn fail_next(&self, error: GatewayError) {
        self.inner.lock().await.next_error = Some(error);
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        self.inner.lock().await.requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Midtrans
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.inner.lock().await;
        state.requests.push(request.clone());

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(CheckoutSession {
            token: format!("mock-token-{}", request.order_id),
            redirect_url: Some(format!(
                "https://mock-gateway.local/checkout/{}",
                request.order_id
            )),
        })
    }
}
