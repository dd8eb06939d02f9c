//! Payment lifecycle status, collection method and gateway provider.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created, nothing requested from a gateway yet.
    Initiated,
    /// Checkout token obtained (or provider reported pending).
    Pending,
    /// Captured but held for fraud review.
    AwaitingCallback,
    Paid,
    PartiallyRefunded,
    Refunded,
    Failed,
    Canceled,
    Expired,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 9] = [
        PaymentStatus::Initiated,
        PaymentStatus::Pending,
        PaymentStatus::AwaitingCallback,
        PaymentStatus::Paid,
        PaymentStatus::PartiallyRefunded,
        PaymentStatus::Refunded,
        PaymentStatus::Failed,
        PaymentStatus::Canceled,
        PaymentStatus::Expired,
    ];

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Pending => "pending",
            PaymentStatus::AwaitingCallback => "awaiting_callback",
            PaymentStatus::Paid => "paid",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown payment status: {}", s))
    }
}

impl StateMachine for PaymentStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Initiated => vec![Pending, Paid, Failed, Canceled, Expired],
            Pending => vec![Pending, AwaitingCallback, Paid, Failed, Canceled, Expired],
            AwaitingCallback => vec![Paid, Failed, Canceled, Expired],
            Paid => vec![Refunded, PartiallyRefunded],
            PartiallyRefunded => vec![PartiallyRefunded, Refunded],
            Refunded | Failed | Canceled | Expired => vec![],
        }
    }
}

/// How the funds are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    BankTransfer,
    Cash,
    Qris,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Other => "other",
        }
    }

    /// Gateway payments are settled by provider callbacks, everything else by staff.
    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Gateway)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(PaymentMethod::Gateway),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cash" => Ok(PaymentMethod::Cash),
            "qris" => Ok(PaymentMethod::Qris),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(format!("unknown payment method: {}", s)),
        }
    }
}

/// External payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProvider {
    Midtrans,
}

impl GatewayProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayProvider::Midtrans => "midtrans",
        }
    }
}

impl fmt::Display for GatewayProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "midtrans" => Ok(GatewayProvider::Midtrans),
            _ => Err(format!("unknown gateway provider: {}", s)),
        }
    }
}

/// The only currency payments may be recorded in.
pub const SUPPORTED_CURRENCY: &str = "IDR";
