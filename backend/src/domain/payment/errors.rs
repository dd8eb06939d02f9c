//! Payment-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | TargetInactive | 400 |
//! | NotFound | 404 |
//! | TargetNotFound | 404 |
//! | InvalidSignature | 401 |
//! | Conflict | 409 |
//! | Gateway | 502 |
//! | Persistence | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId};

/// Errors surfaced by payment commands and the webhook pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Request or notification failed validation.
    ValidationFailed { field: String, message: String },

    /// Payment does not exist (or is soft-deleted) for this tenant.
    NotFound(PaymentId),

    /// The referenced billing target does not exist.
    TargetNotFound { kind: String, id: String },

    /// The referenced billing kind is switched off.
    TargetInactive { id: String },

    /// Notification signature did not match.
    InvalidSignature,

    /// Concurrent writers kept winning the optimistic update.
    Conflict(PaymentId),

    /// Upstream checkout request failed.
    Gateway(String),

    /// Store write or read failed.
    Persistence(String),
}

impl PaymentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(id: PaymentId) -> Self {
        PaymentError::NotFound(id)
    }

    pub fn target_not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        PaymentError::TargetNotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        PaymentError::Gateway(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        PaymentError::Persistence(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::ValidationFailed { .. } => "VALIDATION_FAILED",
            PaymentError::NotFound(_) => "PAYMENT_NOT_FOUND",
            PaymentError::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            PaymentError::TargetInactive { .. } => "TARGET_INACTIVE",
            PaymentError::InvalidSignature => "INVALID_SIGNATURE",
            PaymentError::Conflict(_) => "CONCURRENT_UPDATE",
            PaymentError::Gateway(_) => "GATEWAY_ERROR",
            PaymentError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            PaymentError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            PaymentError::NotFound(id) => format!("Payment not found: {}", id),
            PaymentError::TargetNotFound { kind, id } => {
                format!("Target {} not found: {}", kind, id)
            }
            PaymentError::TargetInactive { id } => format!("Billing kind {} is not active", id),
            PaymentError::InvalidSignature => "Invalid notification signature".to_string(),
            PaymentError::Conflict(id) => {
                format!("Payment {} was modified concurrently, retry later", id)
            }
            PaymentError::Gateway(msg) => format!("Payment gateway error: {}", msg),
            PaymentError::Persistence(msg) => format!("Storage error: {}", msg),
        }
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PaymentError {}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => {
                let field = err.details.get("field").cloned().unwrap_or_default();
                PaymentError::validation(field, err.message)
            }
            ErrorCode::DuplicateExternalId => {
                PaymentError::validation("external_id", err.message)
            }
            _ => PaymentError::Persistence(err.to_string()),
        }
    }
}
