//! HandleGatewayNotificationHandler - the webhook ingestion pipeline.
//!
//! One delivery goes through: parse, verify, ledger write, match, map,
//! persist, propagate, ledger update. The ledger row is always written before
//! the payment is touched, including for rejected and unmatched deliveries.
//!
//! Concurrent deliveries for the same order are serialized by the payment's
//! version column: a lost compare-and-swap re-reads the payment and re-applies
//! the notification, up to [`MAX_UPDATE_ATTEMPTS`] times.

use std::sync::Arc;

use crate::domain::foundation::{GatewayEventId, PaymentId, Timestamp};
use crate::domain::gateway_event::{GatewayEvent, GatewayEventStatus, RawDelivery};
use crate::domain::payment::{
    GatewayNotification, GatewayProvider, Payment, PaymentError, PaymentStatus, SignatureVerifier,
};
use crate::ports::{GatewayEventLedger, PaymentRepository};

use super::propagate_payment_status::PaymentStatusPropagator;

/// Attempts at the compare-and-swap before giving up with `Conflict`.
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Diagnostic recorded on ledger rows that matched no payment.
pub const UNMATCHED_NOTE: &str = "payment not found";

/// Command carrying one raw delivery.
#[derive(Debug, Clone)]
pub struct HandleGatewayNotificationCommand {
    pub provider: GatewayProvider,
    pub delivery: RawDelivery,
}

/// Outcome acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleGatewayNotificationResult {
    /// Matched and applied.
    Processed {
        payment_id: PaymentId,
        payment_status: PaymentStatus,
        transaction_status: String,
        fraud_status: Option<String>,
        gateway_reference: Option<String>,
    },
    /// No payment for the order id. Acknowledged so the gateway stops retrying.
    Ignored { reason: String, order_id: String },
}

/// Handler for gateway notifications.
pub struct HandleGatewayNotificationHandler {
    repository: Arc<dyn PaymentRepository>,
    ledger: Arc<dyn GatewayEventLedger>,
    verifier: SignatureVerifier,
    propagator: PaymentStatusPropagator,
}

impl HandleGatewayNotificationHandler {
    pub fn new(
        repository: Arc<dyn PaymentRepository>,
        ledger: Arc<dyn GatewayEventLedger>,
        verifier: SignatureVerifier,
        propagator: PaymentStatusPropagator,
    ) -> Self {
        Self {
            repository,
            ledger,
            verifier,
            propagator,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleGatewayNotificationCommand,
    ) -> Result<HandleGatewayNotificationResult, PaymentError> {
        let now = Timestamp::now();
        let encoding_error = cmd.delivery.body_text().err();
        let arrival = GatewayEvent::arrived(cmd.provider, cmd.delivery, now);

        // 1. Parse
        if let Some(e) = encoding_error {
            tracing::warn!(error = %e, "Gateway notification body is not valid UTF-8");
            let message = format!("payload is not valid UTF-8: {}", e);
            let event =
                arrival.with_status(GatewayEventStatus::Failed, Some(message.clone()), now);
            self.record_best_effort(event).await;
            return Err(PaymentError::validation("payload", message));
        }
        let notification = match GatewayNotification::parse(arrival.raw_payload.as_bytes()) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable gateway notification");
                let event = arrival.with_status(GatewayEventStatus::Failed, Some(e.message()), now);
                self.record_best_effort(event).await;
                return Err(e);
            }
        };
        let order_id = notification.order_id.clone();
        let arrival = arrival.with_notification(&notification);

        // 2. Verify
        if let Err(e) = self.verifier.verify(&notification) {
            tracing::warn!(order_id = %order_id, "Gateway notification signature mismatch");
            let event = arrival.with_status(
                GatewayEventStatus::InvalidSignature,
                Some("signature mismatch".to_string()),
                now,
            );
            self.record_best_effort(event).await;
            return Err(e);
        }

        // 3. Match
        let payment = match self
            .repository
            .find_by_external_id(cmd.provider, &order_id)
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Payment lookup failed");
                let event =
                    arrival.with_status(GatewayEventStatus::Failed, Some(e.to_string()), now);
                self.record_best_effort(event).await;
                return Err(PaymentError::from(e));
            }
        };

        let Some(payment) = payment else {
            tracing::info!(order_id = %order_id, "Gateway notification matched no payment");
            self.ledger.record(arrival.unmatched(UNMATCHED_NOTE, now)).await?;
            return Ok(HandleGatewayNotificationResult::Ignored {
                reason: UNMATCHED_NOTE.to_string(),
                order_id,
            });
        };

        // 4. Ledger write for the matched delivery
        let write = self.ledger.record(arrival.with_payment(payment.id)).await?;
        if write.is_duplicate() {
            tracing::info!(
                order_id = %order_id,
                event_id = %write.id(),
                "Gateway redelivery, reusing ledger entry"
            );
        }
        let event_id = write.id();

        // 5-7. Map, snapshot, persist
        let payment = match self.apply_with_retry(payment, &notification).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    event_id = %event_id,
                    error = %e,
                    "Failed to persist gateway notification"
                );
                self.mark_best_effort(event_id, GatewayEventStatus::Failed, Some(e.to_string()))
                    .await;
                return Err(e);
            }
        };

        // 8. Propagate; failures never change the outcome
        self.propagator.propagate(&payment).await;

        // 9. Close out the ledger row
        self.mark_best_effort(event_id, GatewayEventStatus::Processed, None)
            .await;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order_id,
            status = %payment.status,
            transaction_status = %notification.transaction_status,
            "Gateway notification processed"
        );

        Ok(HandleGatewayNotificationResult::Processed {
            payment_id: payment.id,
            payment_status: payment.status,
            transaction_status: notification.transaction_status,
            fraud_status: notification.fraud_status,
            gateway_reference: payment.gateway_reference,
        })
    }

    async fn apply_with_retry(
        &self,
        mut payment: Payment,
        notification: &GatewayNotification,
    ) -> Result<Payment, PaymentError> {
        let provider = payment.provider.unwrap_or(GatewayProvider::Midtrans);
        let payment_id = payment.id;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let change = payment.apply_notification(notification, Timestamp::now());
            if change.off_graph {
                tracing::warn!(
                    payment_id = %payment.id,
                    from = %change.previous,
                    to = %change.current,
                    "Off-lifecycle transition from gateway applied"
                );
            }
            if !change.recognized {
                tracing::warn!(
                    payment_id = %payment.id,
                    transaction_status = %notification.transaction_status,
                    "Unrecognized transaction status, status kept"
                );
            }

            match self.repository.update(&payment).await {
                Ok(()) => {
                    payment.version += 1;
                    return Ok(payment);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(payment_id = %payment_id, attempt, "Version conflict, re-reading");
                    payment = self
                        .repository
                        .find_by_external_id(provider, &notification.order_id)
                        .await?
                        .ok_or(PaymentError::NotFound(payment_id))?;
                }
                Err(e) => return Err(PaymentError::from(e)),
            }
        }

        Err(PaymentError::Conflict(payment_id))
    }

    async fn record_best_effort(&self, event: GatewayEvent) {
        if let Err(e) = self.ledger.record(event).await {
            tracing::error!(error = %e, "Failed to record gateway event");
        }
    }

    async fn mark_best_effort(
        &self,
        id: GatewayEventId,
        status: GatewayEventStatus,
        error: Option<String>,
    ) {
        if let Err(e) = self.ledger.mark(id, status, error, Timestamp::now()).await {
            tracing::error!(event_id = %id, status = %status, error = %e, "Failed to update gateway event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryBillingStore, InMemoryEnrollmentStore, InMemoryGatewayEventLedger,
        InMemoryPaymentRepository,
    };
    use crate::domain::foundation::TenantId;
    use crate::domain::payment::{
        compute_signature, ManualDetails, NewPayment, PaymentAnnotation, PaymentMethod,
        PaymentTarget,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    const SERVER_KEY: &str = "SB-Mid-server-test";

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        repo: Arc<InMemoryPaymentRepository>,
        ledger: Arc<InMemoryGatewayEventLedger>,
        billing: Arc<InMemoryBillingStore>,
        handler: HandleGatewayNotificationHandler,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryPaymentRepository::new());
        let ledger = Arc::new(InMemoryGatewayEventLedger::new());
        let billing = Arc::new(InMemoryBillingStore::new());
        let propagator =
            PaymentStatusPropagator::new(billing.clone(), Arc::new(InMemoryEnrollmentStore::new()));
        let handler = HandleGatewayNotificationHandler::new(
            repo.clone(),
            ledger.clone(),
            SignatureVerifier::new(SERVER_KEY),
            propagator,
        );
        Fixture {
            repo,
            ledger,
            billing,
            handler,
        }
    }

    async fn pending_payment(f: &Fixture, order_id: &str) -> Payment {
        let tenant = TenantId::new();
        let bill = f.billing.add_student_bill(tenant, 50_000).await;
        let mut payment = Payment::initiate(
            NewPayment {
                id: PaymentId::new(),
                tenant_id: tenant,
                number: 1,
                target: PaymentTarget::StudentBill(bill),
                amount: 50_000,
                currency: "IDR".to_string(),
                method: PaymentMethod::Gateway,
                provider: Some(GatewayProvider::Midtrans),
                external_id: Some(order_id.to_string()),
                manual: ManualDetails::default(),
                annotation: PaymentAnnotation::default(),
            },
            Timestamp::now(),
        );
        payment.status = PaymentStatus::Pending;
        f.repo.save(&payment).await.unwrap();
        payment
    }

    fn body(order_id: &str, transaction_status: &str, gross_amount: &str, key: &str) -> Vec<u8> {
        json!({
            "order_id": order_id,
            "status_code": "200",
            "gross_amount": gross_amount,
            "transaction_status": transaction_status,
            "fraud_status": "accept",
            "transaction_id": "trx-001",
            "payment_type": "bank_transfer",
            "va_numbers": [{ "bank": "bni", "va_number": "8808123" }],
            "signature_key": compute_signature(order_id, "200", gross_amount, key),
        })
        .to_string()
        .into_bytes()
    }

    fn command(body: Vec<u8>) -> HandleGatewayNotificationCommand {
        HandleGatewayNotificationCommand {
            provider: GatewayProvider::Midtrans,
            delivery: RawDelivery::new(BTreeMap::new(), None, &body),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn settlement_pays_and_closes_ledger_row() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-1").await;

        let result = f
            .handler
            .handle(command(body("INV-1", "settlement", "50000.00", SERVER_KEY)))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandleGatewayNotificationResult::Processed {
                payment_id: payment.id,
                payment_status: PaymentStatus::Paid,
                transaction_status: "settlement".to_string(),
                fraud_status: Some("accept".to_string()),
                gateway_reference: Some("trx-001".to_string()),
            }
        );
        let stored = f.repo.stored(&payment.id).await.unwrap();
        assert!(stored.timestamps.paid_at.is_some());
        assert_eq!(stored.instrument.va_number.as_deref(), Some("8808123"));
        let rows = f.ledger.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, GatewayEventStatus::Processed);
        assert_eq!(rows[0].payment_id, Some(payment.id));
        assert!(rows[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn bad_signature_is_logged_then_rejected() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-2").await;

        let err = f
            .handler
            .handle(command(body("INV-2", "settlement", "50000.00", "wrong-key")))
            .await
            .unwrap_err();

        assert_eq!(err, PaymentError::InvalidSignature);
        let rows = f.ledger.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, GatewayEventStatus::InvalidSignature);
        assert_eq!(rows[0].payment_id, None);
        assert_eq!(f.repo.stored(&payment.id).await.unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_order_is_ignored_but_recorded() {
        let f = fixture();

        let result = f
            .handler
            .handle(command(body("NOPE-1", "settlement", "10.00", SERVER_KEY)))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandleGatewayNotificationResult::Ignored {
                reason: "payment not found".to_string(),
                order_id: "NOPE-1".to_string(),
            }
        );
        let rows = f.ledger.all().await;
        assert_eq!(rows[0].status, GatewayEventStatus::Received);
        assert_eq!(rows[0].payment_id, None);
        assert_eq!(rows[0].error.as_deref(), Some("payment not found"));
        assert!(rows[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn non_utf8_body_is_rejected_before_parsing() {
        let f = fixture();
        pending_payment(&f, "INV-8").await;
        let mut body = body("INV-8", "settlement", "50000.00", SERVER_KEY);
        let at = body.windows(5).position(|w| w == b"INV-8").unwrap() + 4;
        body[at] = 0xff;

        let result = f.handler.handle(command(body)).await;

        assert!(matches!(
            result,
            Err(PaymentError::ValidationFailed { ref field, .. }) if field == "payload"
        ));
        let rows = f.ledger.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, GatewayEventStatus::Failed);
        assert!(rows[0].error.as_deref().unwrap().contains("UTF-8"));
        assert!(rows[0].external_id.is_none());
    }

    #[tokio::test]
    async fn unparseable_body_is_recorded_as_failed() {
        let f = fixture();

        let err = f.handler.handle(command(b"not json".to_vec())).await.unwrap_err();

        assert!(matches!(err, PaymentError::ValidationFailed { .. }));
        let rows = f.ledger.all().await;
        assert_eq!(rows[0].status, GatewayEventStatus::Failed);
        assert_eq!(rows[0].raw_payload, "not json");
        assert!(rows[0].external_id.is_none());
    }

    #[tokio::test]
    async fn replay_keeps_one_ledger_row_and_first_paid_at() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-3").await;
        let payload = body("INV-3", "settlement", "50000.00", SERVER_KEY);

        f.handler.handle(command(payload.clone())).await.unwrap();
        let first_paid_at = f.repo.stored(&payment.id).await.unwrap().timestamps.paid_at;
        f.handler.handle(command(payload)).await.unwrap();

        let stored = f.repo.stored(&payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
        assert_eq!(stored.timestamps.paid_at, first_paid_at);
        let rows = f.ledger.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].try_count, 2);
        assert_eq!(rows[0].status, GatewayEventStatus::Processed);
    }

    #[tokio::test]
    async fn version_conflicts_are_retried() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-4").await;
        f.repo.inject_conflicts(2).await;

        f.handler
            .handle(command(body("INV-4", "settlement", "50000.00", SERVER_KEY)))
            .await
            .unwrap();

        assert_eq!(f.repo.stored(&payment.id).await.unwrap().status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn exhausted_retries_are_a_conflict() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-5").await;
        f.repo.inject_conflicts(MAX_UPDATE_ATTEMPTS).await;

        let err = f
            .handler
            .handle(command(body("INV-5", "settlement", "50000.00", SERVER_KEY)))
            .await
            .unwrap_err();

        assert_eq!(err, PaymentError::Conflict(payment.id));
        assert_eq!(f.ledger.all().await[0].status, GatewayEventStatus::Failed);
    }

    #[tokio::test]
    async fn persistence_failure_marks_ledger_failed() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-6").await;
        f.repo.inject_update_failures(1).await;

        let err = f
            .handler
            .handle(command(body("INV-6", "settlement", "50000.00", SERVER_KEY)))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Persistence(_)));
        let row = &f.ledger.all().await[0];
        assert_eq!(row.status, GatewayEventStatus::Failed);
        assert!(row.error.as_deref().unwrap_or_default().contains("simulated"));
        assert_eq!(f.repo.stored(&payment.id).await.unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn propagation_failure_does_not_fail_delivery() {
        let f = fixture();
        let payment = pending_payment(&f, "INV-7").await;
        f.billing.fail_writes_for(payment.target).await;

        let result = f
            .handler
            .handle(command(body("INV-7", "settlement", "50000.00", SERVER_KEY)))
            .await;

        assert!(result.is_ok());
        assert_eq!(f.repo.stored(&payment.id).await.unwrap().status, PaymentStatus::Paid);
        assert_eq!(f.ledger.all().await[0].status, GatewayEventStatus::Processed);
    }
}
