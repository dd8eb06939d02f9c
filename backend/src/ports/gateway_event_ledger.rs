//! GatewayEventLedger port - audit log of inbound gateway deliveries.
//!
//! Every delivery is written here before any payment is touched, whether or
//! not it matches a payment and whether or not its signature checks out.
//!
//! ## Why Dedup Matters
//!
//! Gateways redeliver notifications on timeouts and non-2xx responses. Live
//! rows are unique per `(provider, external_id)`, so a redelivery does not
//! create a second row: the existing row's `try_count` is bumped and its id
//! returned. Rejected (`invalid_signature`) and unparseable deliveries are
//! always inserted as their own rows.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GatewayEventId, PaymentId, Timestamp};
use crate::domain::gateway_event::{GatewayEvent, GatewayEventStatus};

/// Result of recording a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    /// A new row was created.
    Inserted(GatewayEventId),
    /// A live row for the same `(provider, external_id)` already existed.
    AlreadyRecorded(GatewayEventId),
}

impl LedgerWrite {
    pub fn id(&self) -> GatewayEventId {
        match self {
            LedgerWrite::Inserted(id) | LedgerWrite::AlreadyRecorded(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerWrite::AlreadyRecorded(_))
    }
}

/// Port for the gateway event ledger.
#[async_trait]
pub trait GatewayEventLedger: Send + Sync {
    /// Record a delivery.
    ///
    /// On a dedup hit the existing row keeps its payload; its `try_count` is
    /// incremented and a missing `payment_id` is filled from `event`.
    async fn record(&self, event: GatewayEvent) -> Result<LedgerWrite, DomainError>;

    /// Record how processing of a delivery ended.
    async fn mark(
        &self,
        id: GatewayEventId,
        status: GatewayEventStatus,
        error: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError>;

    /// Find one entry by id.
    async fn find_by_id(&self, id: GatewayEventId) -> Result<Option<GatewayEvent>, DomainError>;

    /// Live entries for a payment, oldest first.
    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<GatewayEvent>, DomainError>;
}
