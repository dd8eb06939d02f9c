//! In-memory GatewayEventLedger.

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, GatewayEventId, PaymentId, Timestamp};
use crate::domain::gateway_event::{GatewayEvent, GatewayEventStatus};
use crate::ports::{GatewayEventLedger, LedgerWrite};

/// Ledger kept in a vector, in arrival order.
#[derive(Default)]
pub struct InMemoryGatewayEventLedger {
    events: RwLock<Vec<GatewayEvent>>,
    fail_records: Mutex<bool>,
}

impl InMemoryGatewayEventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Every row, including soft-deleted ones.
    pub async fn all(&self) -> Vec<GatewayEvent> {
        self.events.read().await.clone()
    }

    /// Make every subsequent `record` fail.
    pub async fn fail_records(&self, fail: bool) {
        *self.fail_records.lock().await = fail;
    }
}

#[async_trait]
impl GatewayEventLedger for InMemoryGatewayEventLedger {
    async fn record(&self, event: GatewayEvent) -> Result<LedgerWrite, DomainError> {
        if *self.fail_records.lock().await {
            return Err(DomainError::database("simulated ledger failure"));
        }

        let mut events = self.events.write().await;

        if event.is_dedup_candidate() {
            let existing = events.iter_mut().find(|e| {
                e.deleted_at.is_none()
                    && e.is_dedup_candidate()
                    && e.provider == event.provider
                    && e.external_id == event.external_id
            });
            if let Some(existing) = existing {
                existing.try_count += 1;
                if existing.payment_id.is_none() {
                    existing.payment_id = event.payment_id;
                }
                return Ok(LedgerWrite::AlreadyRecorded(existing.id));
            }
        }

        let id = event.id;
        events.push(event);
        Ok(LedgerWrite::Inserted(id))
    }

    async fn mark(
        &self,
        id: GatewayEventId,
        status: GatewayEventStatus,
        error: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        let event = events.iter_mut().find(|e| e.id == id).ok_or_else(|| {
            DomainError::new(ErrorCode::NotFound, format!("gateway event {} not found", id))
        })?;

        event.status = status;
        event.error = error;
        event.processed_at = Some(processed_at);
        Ok(())
    }

    async fn find_by_id(&self, id: GatewayEventId) -> Result<Option<GatewayEvent>, DomainError> {
        Ok(self.events.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<GatewayEvent>, DomainError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.deleted_at.is_none() && e.payment_id.as_ref() == Some(payment_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway_event::RawDelivery;
    use crate::domain::payment::GatewayProvider;

    fn event(external_id: Option<&str>) -> GatewayEvent {
        let mut event = GatewayEvent::arrived(
            GatewayProvider::Midtrans,
            RawDelivery::default(),
            Timestamp::now(),
        );
        event.external_id = external_id.map(str::to_string);
        event
    }

    #[tokio::test]
    async fn redelivery_bumps_try_count() {
        let ledger = InMemoryGatewayEventLedger::new();
        let first = ledger.record(event(Some("INV-1"))).await.unwrap();
        let second = ledger.record(event(Some("INV-1"))).await.unwrap();

        assert!(!first.is_duplicate());
        assert_eq!(second, LedgerWrite::AlreadyRecorded(first.id()));
        let rows = ledger.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].try_count, 2);
    }

    #[tokio::test]
    async fn duplicate_fills_missing_payment_id() {
        let ledger = InMemoryGatewayEventLedger::new();
        ledger.record(event(Some("INV-1"))).await.unwrap();
        let payment_id = PaymentId::new();
        ledger
            .record(event(Some("INV-1")).with_payment(payment_id))
            .await
            .unwrap();

        assert_eq!(ledger.list_for_payment(&payment_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparsed_deliveries_are_never_deduplicated() {
        let ledger = InMemoryGatewayEventLedger::new();
        ledger.record(event(None)).await.unwrap();
        ledger.record(event(None)).await.unwrap();
        assert_eq!(ledger.all().await.len(), 2);
    }

    #[tokio::test]
    async fn mark_records_final_status() {
        let ledger = InMemoryGatewayEventLedger::new();
        let id = ledger.record(event(Some("INV-9"))).await.unwrap().id();
        let now = Timestamp::now();
        ledger
            .mark(id, GatewayEventStatus::Processed, None, now)
            .await
            .unwrap();

        let row = ledger.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.status, GatewayEventStatus::Processed);
        assert_eq!(row.processed_at, Some(now));
    }
}
