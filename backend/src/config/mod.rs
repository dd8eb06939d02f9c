//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the `config`
//! and `dotenvy` crates. Variables use the `PAYMENT_RECONCILER` prefix and `__`
//! between nesting levels.
//!
//! # Example
//!
//! ```no_run
//! use payment_reconciler::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod gateway;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewayConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `PAYMENT_RECONCILER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PAYMENT_RECONCILER__GATEWAY__SERVER_KEY=...` -> `gateway.server_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYMENT_RECONCILER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.gateway.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [(&str, &str); 4] = [
        ("PAYMENT_RECONCILER__DATABASE__URL", "postgresql://test@localhost/payments"),
        ("PAYMENT_RECONCILER__GATEWAY__SERVER_KEY", "SB-Mid-server-test"),
        ("PAYMENT_RECONCILER__GATEWAY__CHECKOUT_EXPIRY_MINUTES", "30"),
        ("PAYMENT_RECONCILER__SERVER__PORT", "9090"),
    ];

    fn with_env<T>(f: impl FnOnce() -> T) -> T {
        let _guard = ENV_MUTEX.lock().unwrap();
        for (key, value) in VARS {
            env::set_var(key, value);
        }
        let result = f();
        for (key, _) in VARS {
            env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_load_from_environment() {
        let config = with_env(AppConfig::load).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/payments");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.gateway.checkout_expiry_minutes, 30);
        assert_eq!(config.gateway.provider, crate::domain::payment::GatewayProvider::Midtrans);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_gateway_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PAYMENT_RECONCILER__DATABASE__URL", "postgresql://test@localhost/p");
        let result = AppConfig::load();
        env::remove_var("PAYMENT_RECONCILER__DATABASE__URL");

        assert!(result.is_err());
    }
}
