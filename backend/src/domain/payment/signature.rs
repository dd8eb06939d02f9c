//! Gateway notification signature verification.
//!
//! The provider signs each notification with SHA-512 over
//! `order_id + status_code + gross_amount + server_key`, concatenated with no
//! separators, and sends the lower-case hex digest as `signature_key`.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use super::errors::PaymentError;
use super::notification::GatewayNotification;

/// Verifier bound to one provider's shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    /// Creates a verifier for the given server key.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
        }
    }

    /// Verifies the `signature_key` carried by a notification.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` when the claimed signature is missing, empty, or
    /// does not match the recomputed digest.
    pub fn verify(&self, notification: &GatewayNotification) -> Result<(), PaymentError> {
        let claimed = notification
            .signature_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(PaymentError::InvalidSignature)?;

        let expected = self.compute(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
        );

        if constant_time_compare(expected.as_bytes(), claimed.to_ascii_lowercase().as_bytes()) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }

    /// Lower-case hex SHA-512 of the signed fields and the secret.
    pub fn compute(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        compute_signature(order_id, status_code, gross_amount, self.secret.expose_secret())
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

/// Computes the notification signature for arbitrary inputs.
pub fn compute_signature(order_id: &str, status_code: &str, gross_amount: &str, secret: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
