//! Processing status of a ledger entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where one inbound delivery ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventStatus {
    /// Logged on arrival; unmatched deliveries stay here.
    Received,
    Processing,
    Processed,
    Failed,
    InvalidSignature,
    Ignored,
    Duplicated,
}

impl GatewayEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEventStatus::Received => "received",
            GatewayEventStatus::Processing => "processing",
            GatewayEventStatus::Processed => "processed",
            GatewayEventStatus::Failed => "failed",
            GatewayEventStatus::InvalidSignature => "invalid_signature",
            GatewayEventStatus::Ignored => "ignored",
            GatewayEventStatus::Duplicated => "duplicated",
        }
    }

    /// Statuses that close out a delivery and carry `processed_at`.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            GatewayEventStatus::Processed
                | GatewayEventStatus::Failed
                | GatewayEventStatus::InvalidSignature
                | GatewayEventStatus::Ignored
                | GatewayEventStatus::Duplicated
        )
    }
}

impl fmt::Display for GatewayEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(GatewayEventStatus::Received),
            "processing" => Ok(GatewayEventStatus::Processing),
            // Older rows used "success" for processed deliveries.
            "processed" | "success" => Ok(GatewayEventStatus::Processed),
            "failed" => Ok(GatewayEventStatus::Failed),
            "invalid_signature" => Ok(GatewayEventStatus::InvalidSignature),
            "ignored" => Ok(GatewayEventStatus::Ignored),
            "duplicated" => Ok(GatewayEventStatus::Duplicated),
            _ => Err(format!("unknown gateway event status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_alias_parses_as_processed() {
        assert_eq!("success".parse(), Ok(GatewayEventStatus::Processed));
        assert_eq!(GatewayEventStatus::Processed.as_str(), "processed");
    }

    #[test]
    fn received_is_not_final() {
        assert!(!GatewayEventStatus::Received.is_final());
        assert!(GatewayEventStatus::InvalidSignature.is_final());
    }
}
