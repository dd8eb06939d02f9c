//! HTTP DTOs for payment endpoints.
//!
//! Requests deserialize straight into application commands; responses are
//! flat JSON views of the aggregate and the ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::{HandleGatewayNotificationResult, PropagationReport, RowOutcome};
use crate::domain::foundation::{
    BillingId, BillingKindId, Patch, StudentBillId, Timestamp, UserId,
};
use crate::domain::gateway_event::{GatewayEvent, GatewayEventStatus};
use crate::domain::payment::{
    ChannelSnapshot, GatewayProvider, Payment, PaymentMethod, PaymentStatus,
};
use crate::ports::CheckoutSession;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to record a payment attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub student_bill_id: Option<StudentBillId>,
    #[serde(default)]
    pub billing_id: Option<BillingId>,
    #[serde(default)]
    pub billing_kind_id: Option<BillingKindId>,
    /// Minor units; defaults to the target's amount.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub method: PaymentMethod,
    #[serde(default)]
    pub provider: Option<GatewayProvider>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub manual_channel: Option<String>,
    #[serde(default)]
    pub manual_reference: Option<String>,
    #[serde(default)]
    pub verified_by: Option<UserId>,
    #[serde(default)]
    pub verified_at: Option<Timestamp>,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// Partial update. Absent keys are left alone, `null` clears.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatchPaymentRequest {
    pub status: Option<PaymentStatus>,
    pub amount: Option<i64>,
    pub gateway_reference: Patch<String>,
    pub checkout_url: Patch<String>,
    pub manual_channel: Patch<String>,
    pub manual_reference: Patch<String>,
    pub verified_by: Patch<UserId>,
    pub verified_at: Patch<Timestamp>,
    pub expires_at: Patch<Timestamp>,
    pub paid_at: Patch<Timestamp>,
    pub canceled_at: Patch<Timestamp>,
    pub failed_at: Patch<Timestamp>,
    pub refunded_at: Patch<Timestamp>,
    pub meta: Patch<Value>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PaymentTargetResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
}

/// Payment as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub tenant_id: String,
    pub number: i64,
    pub target: PaymentTargetResponse,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub provider: Option<GatewayProvider>,
    pub external_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub checkout_token: Option<String>,
    pub checkout_url: Option<String>,
    pub instrument: ChannelSnapshot,
    pub manual_channel: Option<String>,
    pub manual_reference: Option<String>,
    pub recorded_by: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub requested_at: String,
    pub expires_at: Option<String>,
    pub paid_at: Option<String>,
    pub canceled_at: Option<String>,
    pub failed_at: Option<String>,
    pub refunded_at: Option<String>,
    pub meta: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
    pub version: i32,
}

fn rfc3339(ts: Option<Timestamp>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        let target_id = p
            .target
            .student_bill_id()
            .map(|id| id.to_string())
            .or_else(|| p.target.billing_id().map(|id| id.to_string()))
            .or_else(|| p.target.billing_kind_id().map(|id| id.to_string()))
            .unwrap_or_default();

        Self {
            id: p.id.to_string(),
            tenant_id: p.tenant_id.to_string(),
            number: p.number,
            target: PaymentTargetResponse {
                kind: p.target.kind(),
                id: target_id,
            },
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            method: p.method,
            provider: p.provider,
            external_id: p.external_id,
            gateway_reference: p.gateway_reference,
            checkout_token: p.checkout_token,
            checkout_url: p.checkout_url,
            instrument: p.instrument,
            manual_channel: p.manual.channel,
            manual_reference: p.manual.reference,
            recorded_by: p.manual.recorded_by.map(|id| id.to_string()),
            verified_by: p.manual.verified_by.map(|id| id.to_string()),
            verified_at: rfc3339(p.manual.verified_at),
            requested_at: p.timestamps.requested_at.to_rfc3339(),
            expires_at: rfc3339(p.timestamps.expires_at),
            paid_at: rfc3339(p.timestamps.paid_at),
            canceled_at: rfc3339(p.timestamps.canceled_at),
            failed_at: rfc3339(p.timestamps.failed_at),
            refunded_at: rfc3339(p.timestamps.refunded_at),
            meta: p.annotation.to_json(),
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
            version: p.version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub token: String,
    pub redirect_url: Option<String>,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            token: session.token,
            redirect_url: session.redirect_url,
        }
    }
}

/// Row-level propagation outcome, reported so staff can see partial failures.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationResponse {
    pub billing: Option<String>,
    pub enrollments: Vec<EnrollmentOutcomeResponse>,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcomeResponse {
    pub enrollment_id: String,
    pub outcome: String,
}

fn outcome_label(outcome: &RowOutcome) -> String {
    match outcome {
        RowOutcome::Updated => "updated".to_string(),
        RowOutcome::Missing => "missing".to_string(),
        RowOutcome::Failed(reason) => format!("failed: {}", reason),
    }
}

impl From<PropagationReport> for PropagationResponse {
    fn from(report: PropagationReport) -> Self {
        Self {
            failures: report.failures(),
            billing: report.billing.as_ref().map(outcome_label),
            enrollments: report
                .enrollments
                .iter()
                .map(|(id, outcome)| EnrollmentOutcomeResponse {
                    enrollment_id: id.to_string(),
                    outcome: outcome_label(outcome),
                })
                .collect(),
        }
    }
}

/// Response for create and patch.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentCommandResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<CheckoutResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<PropagationResponse>,
}

/// One ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayEventResponse {
    pub id: String,
    pub payment_id: Option<String>,
    pub provider: GatewayProvider,
    pub external_id: Option<String>,
    pub external_ref: Option<String>,
    pub status: GatewayEventStatus,
    pub error: Option<String>,
    pub try_count: i32,
    pub raw_payload: String,
    pub received_at: String,
    pub processed_at: Option<String>,
}

impl From<GatewayEvent> for GatewayEventResponse {
    fn from(e: GatewayEvent) -> Self {
        Self {
            id: e.id.to_string(),
            payment_id: e.payment_id.map(|id| id.to_string()),
            provider: e.provider,
            external_id: e.external_id,
            external_ref: e.external_ref,
            status: e.status,
            error: e.error,
            try_count: e.try_count,
            raw_payload: e.raw_payload,
            received_at: e.received_at.to_rfc3339(),
            processed_at: rfc3339(e.processed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayEventListResponse {
    pub events: Vec<GatewayEventResponse>,
}

/// Acknowledgement sent back to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookResponse {
    Ok {
        payment_id: String,
        payment_status: PaymentStatus,
        transaction_status: String,
        fraud_status: Option<String>,
        gateway_reference: Option<String>,
    },
    Ignored {
        reason: String,
        order_id: String,
    },
}

impl From<HandleGatewayNotificationResult> for WebhookResponse {
    fn from(result: HandleGatewayNotificationResult) -> Self {
        match result {
            HandleGatewayNotificationResult::Processed {
                payment_id,
                payment_status,
                transaction_status,
                fraud_status,
                gateway_reference,
            } => WebhookResponse::Ok {
                payment_id: payment_id.to_string(),
                payment_status,
                transaction_status,
                fraud_status,
                gateway_reference,
            },
            HandleGatewayNotificationResult::Ignored { reason, order_id } => {
                WebhookResponse::Ignored { reason, order_id }
            }
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
