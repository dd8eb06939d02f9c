//! Payment gateway configuration (Midtrans)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::midtrans::{MidtransConfig, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
use crate::domain::payment::{GatewayProvider, SignatureVerifier};

use super::error::ValidationError;

/// Gateway configuration.
///
/// The server key is the provider's shared secret: it authenticates checkout
/// requests and signs inbound notifications.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_provider")]
    pub provider: GatewayProvider,

    pub server_key: SecretString,

    /// Overrides the sandbox/production host.
    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub is_production: bool,

    /// Lifetime of a checkout token.
    #[serde(default = "default_checkout_expiry")]
    pub checkout_expiry_minutes: i64,

    /// Use the in-process mock gateway instead of calling the provider.
    #[serde(default)]
    pub use_mock: bool,
}

impl GatewayConfig {
    pub fn base_url(&self) -> &str {
        match &self.api_base_url {
            Some(url) => url,
            None if self.is_production => PRODUCTION_BASE_URL,
            None => SANDBOX_BASE_URL,
        }
    }

    pub fn midtrans(&self) -> MidtransConfig {
        MidtransConfig::new(self.server_key.clone(), self.base_url())
    }

    pub fn signature_verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(self.server_key.expose_secret().clone())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.server_key.expose_secret();
        if key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY__SERVER_KEY"));
        }
        if self.is_production && key.starts_with("SB-") {
            return Err(ValidationError::SandboxKeyInProduction);
        }
        if self.is_production && !self.base_url().starts_with("https://") {
            return Err(ValidationError::GatewayUrlMustBeHttps);
        }
        if !(1..=10_080).contains(&self.checkout_expiry_minutes) {
            return Err(ValidationError::InvalidCheckoutExpiry);
        }
        Ok(())
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("server_key", &"[REDACTED]")
            .field("api_base_url", &self.base_url())
            .field("is_production", &self.is_production)
            .field("checkout_expiry_minutes", &self.checkout_expiry_minutes)
            .field("use_mock", &self.use_mock)
            .finish()
    }
}

fn default_provider() -> GatewayProvider {
    GatewayProvider::Midtrans
}

fn default_checkout_expiry() -> i64 {
    60
}
