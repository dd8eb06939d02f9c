//! Midtrans gateway adapter.
//!
//! - `MidtransSnapClient` - Snap checkout-token client (reqwest)
//! - `MockPaymentGateway` - In-process gateway for tests and local runs

mod mock_gateway;
mod snap_client;

pub use mock_gateway::MockPaymentGateway;
pub use snap_client::{MidtransConfig, MidtransSnapClient, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
