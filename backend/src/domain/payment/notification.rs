//! Gateway notification schema.
//!
//! Mirrors the JSON body the provider posts to the webhook endpoint. Only the
//! fields the pipeline reads are typed; channel-specific sub-fields are kept as
//! the provider sent them and surfaced through [`ChannelSnapshot`].

use serde::{Deserialize, Serialize};

use super::errors::PaymentError;

/// One virtual-account entry (`va_numbers[]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAccount {
    pub bank: String,
    pub va_number: String,
}

/// Provider notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    /// Merchant order id; the payment's `external_id`.
    pub order_id: String,
    pub status_code: String,
    /// Decimal string, e.g. `"50000.00"`.
    pub gross_amount: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_time: Option<String>,
    #[serde(default)]
    pub va_numbers: Vec<VirtualAccount>,
    #[serde(default)]
    pub permata_va_number: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub payment_code: Option<String>,
}

/// Display-only instrument details captured from a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub payment_type: Option<String>,
    pub bank: Option<String>,
    pub va_number: Option<String>,
    pub store: Option<String>,
    pub payment_code: Option<String>,
}

impl ChannelSnapshot {
    pub fn is_empty(&self) -> bool {
        self == &ChannelSnapshot::default()
    }
}

impl GatewayNotification {
    /// Parses a raw webhook body.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when the body is not a notification.
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::validation("payload", format!("invalid notification: {}", e)))
    }

    /// Gross amount rounded to the nearest minor unit, if it parses.
    pub fn gross_amount_minor(&self) -> Option<i64> {
        let value: f64 = self.gross_amount.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 || value > i64::MAX as f64 {
            return None;
        }
        Some(value.round() as i64)
    }

    /// Bank/VA/store/code fields for the channel that was used.
    pub fn channel_snapshot(&self) -> ChannelSnapshot {
        let (bank, va_number) = match (self.va_numbers.first(), &self.permata_va_number) {
            (Some(va), _) => (Some(va.bank.clone()), Some(va.va_number.clone())),
            (None, Some(permata)) => (Some("permata".to_string()), Some(permata.clone())),
            (None, None) => (self.bank.clone(), None),
        };

        ChannelSnapshot {
            payment_type: self.payment_type.clone(),
            bank,
            va_number,
            store: self.store.clone(),
            payment_code: self.payment_code.clone(),
        }
    }
}
