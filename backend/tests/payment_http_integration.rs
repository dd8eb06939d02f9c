//! Integration tests for the payment HTTP surface.
//!
//! Drives the full router over in-memory adapters and the mock gateway:
//! 1. Staff endpoints (create, fetch, patch, delete, ledger listing)
//! 2. The Midtrans webhook, from signature check to billing propagation
//! 3. Registration payments fanning out to enrollment rows
//! 4. Slow propagation under a short request timeout

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use payment_reconciler::adapters::http::{app_router, PaymentAppState};
use payment_reconciler::adapters::memory::{
    InMemoryBillingStore, InMemoryEnrollmentStore, InMemoryGatewayEventLedger,
    InMemoryPaymentRepository,
};
use payment_reconciler::adapters::midtrans::MockPaymentGateway;
use payment_reconciler::domain::foundation::{DomainError, EnrollmentId, PaymentId, TenantId};
use payment_reconciler::domain::gateway_event::GatewayEventStatus;
use payment_reconciler::domain::payment::{compute_signature, PaymentTarget, SignatureVerifier};
use payment_reconciler::domain::propagation::{BillingSync, EnrollmentStatus};
use payment_reconciler::ports::BillingRecordWriter;

const SERVER_KEY: &str = "SB-Mid-server-integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    router: Router,
    tenant: TenantId,
    payments: Arc<InMemoryPaymentRepository>,
    ledger: Arc<InMemoryGatewayEventLedger>,
    billing: Arc<InMemoryBillingStore>,
    enrollments: Arc<InMemoryEnrollmentStore>,
    gateway: MockPaymentGateway,
}

/// Billing writer that takes its time before delegating.
struct SlowBillingWriter {
    inner: Arc<InMemoryBillingStore>,
    delay: Duration,
}

#[async_trait]
impl BillingRecordWriter for SlowBillingWriter {
    async fn sync_paid_state(
        &self,
        tenant_id: &TenantId,
        target: &PaymentTarget,
        sync: BillingSync,
    ) -> Result<bool, DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.sync_paid_state(tenant_id, target, sync).await
    }
}

impl TestApp {
    fn new() -> Self {
        Self::build(None, Duration::from_secs(10))
    }

    /// Billing writes stall for `delay`; staff requests time out after `request_timeout`.
    fn with_slow_billing(delay: Duration, request_timeout: Duration) -> Self {
        Self::build(Some(delay), request_timeout)
    }

    fn build(billing_delay: Option<Duration>, request_timeout: Duration) -> Self {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let ledger = Arc::new(InMemoryGatewayEventLedger::new());
        let billing = Arc::new(InMemoryBillingStore::new());
        let enrollments = Arc::new(InMemoryEnrollmentStore::new());
        let gateway = MockPaymentGateway::new();

        let billing_writer: Arc<dyn BillingRecordWriter> = match billing_delay {
            Some(delay) => Arc::new(SlowBillingWriter {
                inner: billing.clone(),
                delay,
            }),
            None => billing.clone(),
        };

        let state = PaymentAppState {
            payment_repository: payments.clone(),
            gateway_event_ledger: ledger.clone(),
            target_reader: billing.clone(),
            billing_writer,
            enrollment_writer: enrollments.clone(),
            payment_gateway: Arc::new(gateway.clone()),
            signature_verifier: SignatureVerifier::new(SERVER_KEY),
            checkout_expiry_minutes: 60,
        };

        Self {
            router: app_router(state, request_timeout),
            tenant: TenantId::new(),
            payments,
            ledger,
            billing,
            enrollments,
            gateway,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn staff(&self, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Tenant-Id", self.tenant.to_string())
            .header("content-type", "application/json");
        match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn create(&self, body: Value) -> (StatusCode, Value) {
        self.send(self.staff("POST", "/api/payments", Some(body))).await
    }

    fn webhook_request(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/webhooks/midtrans")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn webhook(&self, body: Value) -> (StatusCode, Value) {
        self.send(Self::webhook_request(&body)).await
    }

    /// Creates a gateway payment for a fresh 50 000 bill.
    async fn gateway_payment(&self, order_id: &str) -> (PaymentTarget, String) {
        let bill = self.billing.add_student_bill(self.tenant, 50_000).await;
        let (status, body) = self
            .create(json!({
                "student_bill_id": bill,
                "method": "gateway",
                "provider": "midtrans",
                "external_id": order_id,
            }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            PaymentTarget::StudentBill(bill),
            body["id"].as_str().unwrap().to_string(),
        )
    }
}

fn notification(order_id: &str, transaction_status: &str, gross_amount: &str, key: &str) -> Value {
    json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": gross_amount,
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "transaction_id": format!("trx-{}", order_id),
        "payment_type": "bank_transfer",
        "va_numbers": [{ "bank": "bca", "va_number": "12345678901" }],
        "signature_key": compute_signature(order_id, "200", gross_amount, key),
    })
}

// =============================================================================
// Payment Creation
// =============================================================================

#[tokio::test]
async fn gateway_payment_moves_to_pending_with_checkout() {
    let app = TestApp::new();
    let bill = app.billing.add_student_bill(app.tenant, 50_000).await;

    let (status, body) = app
        .create(json!({
            "student_bill_id": bill,
            "method": "gateway",
            "provider": "midtrans",
            "external_id": "INV-A",
        }))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], 50_000);
    assert_eq!(body["number"], 1);
    assert_eq!(body["checkout_token"], "mock-token-INV-A");
    assert_eq!(body["checkout"]["token"], "mock-token-INV-A");
    assert!(body["expires_at"].is_string());

    let requests = app.gateway.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].order_id, "INV-A");
    assert_eq!(requests[0].gross_amount, 50_000);
}

#[tokio::test]
async fn payment_numbers_increase_per_tenant() {
    let app = TestApp::new();
    app.gateway_payment("INV-N1").await;
    let (_, id) = app.gateway_payment("INV-N2").await;

    let (_, body) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(body["number"], 2);
}

#[tokio::test]
async fn duplicate_external_id_is_rejected() {
    let app = TestApp::new();
    app.gateway_payment("INV-DUP").await;
    let bill = app.billing.add_student_bill(app.tenant, 10_000).await;

    let (status, body) = app
        .create(json!({
            "student_bill_id": bill,
            "method": "gateway",
            "provider": "midtrans",
            "external_id": "INV-DUP",
        }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn two_targets_are_rejected() {
    let app = TestApp::new();
    let bill = app.billing.add_student_bill(app.tenant, 10_000).await;
    let billing = app.billing.add_billing(app.tenant, 10_000).await;

    let (status, _) = app
        .create(json!({
            "student_bill_id": bill,
            "billing_id": billing,
            "method": "cash",
        }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inactive_billing_kind_is_rejected() {
    let app = TestApp::new();
    let kind = app
        .billing
        .add_billing_kind(app.tenant, Some(25_000), false)
        .await;

    let (status, body) = app
        .create(json!({ "billing_kind_id": kind, "method": "cash" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TARGET_INACTIVE");
}

#[tokio::test]
async fn target_of_another_tenant_is_not_found() {
    let app = TestApp::new();
    let bill = app.billing.add_student_bill(TenantId::new(), 10_000).await;

    let (status, body) = app
        .create(json!({ "student_bill_id": bill, "method": "cash" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TARGET_NOT_FOUND");
}

#[tokio::test]
async fn missing_tenant_header_is_unauthorized() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/payments/{}", PaymentId::new()))
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TENANT_REQUIRED");
}

// =============================================================================
// Webhook Reconciliation
// =============================================================================

#[tokio::test]
async fn settlement_pays_payment_and_bill() {
    let app = TestApp::new();
    let (target, id) = app.gateway_payment("INV-B").await;

    let (status, body) = app
        .webhook(notification("INV-B", "settlement", "50000.00", SERVER_KEY))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["gateway_reference"], "trx-INV-B");

    let (_, payment) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(payment["status"], "paid");
    assert!(payment["paid_at"].is_string());
    assert_eq!(payment["instrument"]["va_number"], "12345678901");

    let bill = app.billing.paid_state(&target).await.unwrap();
    assert!(bill.is_paid);
    assert!(bill.paid_at.is_some());
}

#[tokio::test]
async fn bad_signature_is_unauthorized_and_recorded() {
    let app = TestApp::new();
    let (target, id) = app.gateway_payment("INV-C").await;

    let (status, body) = app
        .webhook(notification("INV-C", "settlement", "50000.00", "wrong-key"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let rows = app.ledger.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, GatewayEventStatus::InvalidSignature);

    let stored = app
        .payments
        .stored(&id.parse::<PaymentId>().unwrap())
        .await
        .unwrap();
    assert_eq!(stored.status.as_str(), "pending");
    assert!(!app.billing.paid_state(&target).await.unwrap().is_paid);
}

#[tokio::test]
async fn unknown_order_is_acknowledged_as_ignored() {
    let app = TestApp::new();

    let (status, body) = app
        .webhook(notification("INV-UNKNOWN", "settlement", "10000.00", SERVER_KEY))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["order_id"], "INV-UNKNOWN");

    let rows = app.ledger.all().await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].payment_id.is_none());
    assert_eq!(rows[0].status, GatewayEventStatus::Received);
    assert!(rows[0].processed_at.is_some());
}

#[tokio::test]
async fn partial_refund_renormalizes_amount() {
    let app = TestApp::new();
    let (_, id) = app.gateway_payment("INV-E").await;
    app.webhook(notification("INV-E", "settlement", "50000.00", SERVER_KEY))
        .await;

    let (status, body) = app
        .webhook(notification("INV-E", "partial_refund", "20000.00", SERVER_KEY))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "partially_refunded");

    let (_, payment) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(payment["amount"], 20_000);
    assert!(payment["refunded_at"].is_string());
}

#[tokio::test]
async fn replayed_delivery_keeps_one_ledger_row() {
    let app = TestApp::new();
    let (_, id) = app.gateway_payment("INV-R").await;
    let delivery = notification("INV-R", "settlement", "50000.00", SERVER_KEY);

    let (first, _) = app.webhook(delivery.clone()).await;
    let (_, before) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    let (second, body) = app.webhook(delivery).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["payment_status"], "paid");

    let (_, events) = app
        .send(app.staff("GET", &format!("/api/payments/{}/gateway-events", id), None))
        .await;
    let events = events["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["try_count"], 2);
    assert_eq!(events[0]["status"], "processed");

    let (_, after) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(before["paid_at"], after["paid_at"]);
}

#[tokio::test]
async fn slow_propagation_still_completes_webhook() {
    let app = TestApp::with_slow_billing(Duration::from_millis(400), Duration::from_millis(100));
    let (target, id) = app.gateway_payment("INV-SLOW").await;

    let (status, body) = app
        .webhook(notification("INV-SLOW", "settlement", "50000.00", SERVER_KEY))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["payment_status"], "paid");
    assert!(app.billing.paid_state(&target).await.unwrap().is_paid);

    let rows = app.ledger.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, GatewayEventStatus::Processed);
    assert!(rows[0].processed_at.is_some());
    assert_eq!(rows[0].payment_id.map(|p| p.to_string()), Some(id));
}

#[tokio::test]
async fn dropped_webhook_request_still_runs_to_completion() {
    let app = TestApp::with_slow_billing(Duration::from_millis(300), Duration::from_secs(10));
    let (target, _) = app.gateway_payment("INV-DROP").await;
    let request =
        TestApp::webhook_request(&notification("INV-DROP", "settlement", "50000.00", SERVER_KEY));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), app.router.clone().oneshot(request)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(app.billing.paid_state(&target).await.unwrap().is_paid);
    let rows = app.ledger.all().await;
    assert_eq!(rows[0].status, GatewayEventStatus::Processed);
}

#[tokio::test]
async fn malformed_webhook_body_is_a_bad_request() {
    let app = TestApp::new();

    let (status, _) = app.webhook(json!({ "hello": "world" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let rows = app.ledger.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, GatewayEventStatus::Failed);
}

// =============================================================================
// Staff Corrections
// =============================================================================

#[tokio::test]
async fn patching_status_propagates_to_bill() {
    let app = TestApp::new();
    let bill = app.billing.add_student_bill(app.tenant, 30_000).await;
    let (_, created) = app
        .create(json!({ "student_bill_id": bill, "method": "bank_transfer" }))
        .await;
    assert_eq!(created["status"], "initiated");
    let id = created["id"].as_str().unwrap();

    let (status, body) = app
        .send(app.staff(
            "PATCH",
            &format!("/api/payments/{}", id),
            Some(json!({ "status": "paid", "manual_reference": "TRF-77" })),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["manual_reference"], "TRF-77");
    assert_eq!(body["propagation"]["billing"], "updated");
    let paid = app
        .billing
        .paid_state(&PaymentTarget::StudentBill(bill))
        .await
        .unwrap();
    assert!(paid.is_paid);
}

#[tokio::test]
async fn deleted_payment_is_gone_and_frees_external_id() {
    let app = TestApp::new();
    let (_, id) = app.gateway_payment("INV-DEL").await;

    let (status, _) = app
        .send(app.staff("DELETE", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(app.staff("GET", &format!("/api/payments/{}", id), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PAYMENT_NOT_FOUND");

    app.gateway_payment("INV-DEL").await;
}

// =============================================================================
// Registration Propagation
// =============================================================================

#[tokio::test]
async fn registration_bundle_updates_every_enrollment_despite_one_failure() {
    let app = TestApp::new();
    let kind = app
        .billing
        .add_billing_kind(app.tenant, Some(100_000), true)
        .await;
    let first = app.enrollments.add(app.tenant).await;
    let broken = app.enrollments.add(app.tenant).await;
    let last = app.enrollments.add(app.tenant).await;
    app.enrollments.fail_writes_for(broken).await;

    let (status, body) = app
        .create(json!({
            "billing_kind_id": kind,
            "method": "cash",
            "status": "paid",
            "meta": {
                "category": "registration",
                "enrollment_ids": [first, broken, last],
            },
        }))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["propagation"]["failures"], 1);
    assert_eq!(body["propagation"]["enrollments"].as_array().unwrap().len(), 3);

    for id in [first, last] {
        let row = app.enrollments.get(&id).await.unwrap();
        assert_eq!(row.status, EnrollmentStatus::Accepted);
        assert!(row.accepted_at.is_some());
        assert_eq!(row.total_due, Some(100_000));
    }
    let untouched = app.enrollments.get(&broken).await.unwrap();
    assert_eq!(untouched.status, EnrollmentStatus::AwaitingPayment);
}

#[tokio::test]
async fn total_due_is_seeded_once() {
    let app = TestApp::new();
    let kind = app
        .billing
        .add_billing_kind(app.tenant, Some(100_000), true)
        .await;
    let enrollment: EnrollmentId = app.enrollments.add(app.tenant).await;

    for amount in [100_000, 75_000] {
        let (status, _) = app
            .create(json!({
                "billing_kind_id": kind,
                "amount": amount,
                "method": "cash",
                "status": "paid",
                "meta": { "category": "registration", "enrollment_id": enrollment },
            }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let row = app.enrollments.get(&enrollment).await.unwrap();
    assert_eq!(row.total_due, Some(100_000));
}

#[tokio::test]
async fn canceling_registration_clears_enrollment_linkage() {
    let app = TestApp::new();
    let kind = app
        .billing
        .add_billing_kind(app.tenant, Some(100_000), true)
        .await;
    let enrollment = app.enrollments.add(app.tenant).await;

    let (_, created) = app
        .create(json!({
            "billing_kind_id": kind,
            "method": "cash",
            "status": "paid",
            "meta": { "category": "registration", "enrollment_ids": [enrollment] },
        }))
        .await;
    let id = created["id"].as_str().unwrap();
    assert!(app.enrollments.get(&enrollment).await.unwrap().payment_id.is_some());

    let (status, _) = app
        .send(app.staff(
            "PATCH",
            &format!("/api/payments/{}", id),
            Some(json!({ "status": "canceled" })),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let row = app.enrollments.get(&enrollment).await.unwrap();
    assert_eq!(row.status, EnrollmentStatus::AwaitingPayment);
    assert!(row.payment_id.is_none());
}
