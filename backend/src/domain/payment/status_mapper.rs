//! Gateway status mapping.
//!
//! Translates the provider's `(transaction_status, fraud_status)` pair into
//! the internal lifecycle status plus the single timestamp field that the
//! transition implies. Pure and deterministic; no I/O.

use super::status::PaymentStatus;

/// Transaction status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Refund,
    PartialRefund,
    Failure,
    Unrecognized(String),
}

impl TransactionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "capture" => TransactionStatus::Capture,
            "settlement" => TransactionStatus::Settlement,
            "pending" => TransactionStatus::Pending,
            "deny" => TransactionStatus::Deny,
            "cancel" => TransactionStatus::Cancel,
            "expire" => TransactionStatus::Expire,
            "refund" => TransactionStatus::Refund,
            "partial_refund" => TransactionStatus::PartialRefund,
            "failure" => TransactionStatus::Failure,
            _ => TransactionStatus::Unrecognized(raw.to_string()),
        }
    }
}

/// Fraud screening verdict; only meaningful for `capture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudStatus {
    Accept,
    Challenge,
    /// `deny`, missing, or anything the provider adds later.
    Other,
}

impl FraudStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "accept" => FraudStatus::Accept,
            Some(s) if s == "challenge" => FraudStatus::Challenge,
            _ => FraudStatus::Other,
        }
    }
}

/// Timestamp column a transition stamps (first write wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampField {
    PaidAt,
    FailedAt,
    CanceledAt,
    RefundedAt,
}

impl StampField {
    /// Timestamp a status implies, for transitions that bypass the mapper.
    pub fn implied_by(status: PaymentStatus) -> Option<Self> {
        match status {
            PaymentStatus::Paid => Some(StampField::PaidAt),
            PaymentStatus::Failed => Some(StampField::FailedAt),
            PaymentStatus::Canceled => Some(StampField::CanceledAt),
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
                Some(StampField::RefundedAt)
            }
            _ => None,
        }
    }
}

/// Result of mapping one provider notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMapping {
    pub status: PaymentStatus,
    pub stamp: Option<StampField>,
}

impl StatusMapping {
    const fn new(status: PaymentStatus, stamp: Option<StampField>) -> Self {
        Self { status, stamp }
    }
}

/// Maps a provider status pair to the internal status.
///
/// Returns `None` for an unrecognized transaction status; the caller keeps
/// the payment's current status in that case.
pub fn map_transaction_status(
    transaction: &TransactionStatus,
    fraud: FraudStatus,
) -> Option<StatusMapping> {
    use PaymentStatus as S;
    use StampField as F;

    let mapping = match transaction {
        TransactionStatus::Capture => match fraud {
            FraudStatus::Accept => StatusMapping::new(S::Paid, Some(F::PaidAt)),
            FraudStatus::Challenge => StatusMapping::new(S::AwaitingCallback, None),
            FraudStatus::Other => StatusMapping::new(S::Failed, Some(F::FailedAt)),
        },
        TransactionStatus::Settlement => StatusMapping::new(S::Paid, Some(F::PaidAt)),
        TransactionStatus::Pending => StatusMapping::new(S::Pending, None),
        TransactionStatus::Deny => StatusMapping::new(S::Failed, Some(F::FailedAt)),
        TransactionStatus::Cancel => StatusMapping::new(S::Canceled, Some(F::CanceledAt)),
        TransactionStatus::Expire => StatusMapping::new(S::Expired, None),
        TransactionStatus::Refund => StatusMapping::new(S::Refunded, Some(F::RefundedAt)),
        TransactionStatus::PartialRefund => {
            StatusMapping::new(S::PartiallyRefunded, Some(F::RefundedAt))
        }
        TransactionStatus::Failure => StatusMapping::new(S::Failed, Some(F::FailedAt)),
        TransactionStatus::Unrecognized(_) => return None,
    };

    Some(mapping)
}

/// Convenience wrapper over raw provider strings that falls back to `current`.
pub fn resolve_status(
    current: PaymentStatus,
    transaction_status: &str,
    fraud_status: Option<&str>,
) -> StatusMapping {
    map_transaction_status(
        &TransactionStatus::parse(transaction_status),
        FraudStatus::parse(fraud_status),
    )
    .unwrap_or(StatusMapping::new(current, None))
}
