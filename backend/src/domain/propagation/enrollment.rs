//! Enrollment synchronization for registration payments.
//!
//! Enrollments are owned elsewhere; this module only decides what a payment
//! status means for one of them and how that is written.

use serde_json::{json, Map, Value};

use crate::domain::foundation::{EnrollmentId, PaymentId, Timestamp};
use crate::domain::payment::{Payment, PaymentStatus};

use super::merge::deep_merge;

const PREF_REGISTRATION: &str = "registration";
const PREF_PAYER_ID: &str = "payer_id";

/// Enrollment status, as far as payments are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentStatus {
    AwaitingPayment,
    Accepted,
    /// Statuses managed by the enrollment workflow itself.
    Other(String),
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EnrollmentStatus::AwaitingPayment => "awaiting_payment",
            EnrollmentStatus::Accepted => "accepted",
            EnrollmentStatus::Other(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "awaiting_payment" => EnrollmentStatus::AwaitingPayment,
            "accepted" => EnrollmentStatus::Accepted,
            other => EnrollmentStatus::Other(other.to_string()),
        }
    }
}

/// Payment linkage written onto the enrollment.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentLink {
    Link { payment_id: PaymentId, snapshot: Value },
    Clear,
}

/// Payment-owned columns of an enrollment row.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub accepted_at: Option<Timestamp>,
    pub payment_id: Option<PaymentId>,
    pub payment_snapshot: Option<Value>,
    pub preferences: Value,
    pub total_due: Option<i64>,
}

impl EnrollmentRecord {
    pub fn new(id: EnrollmentId) -> Self {
        Self {
            id,
            status: EnrollmentStatus::AwaitingPayment,
            accepted_at: None,
            payment_id: None,
            payment_snapshot: None,
            preferences: Value::Object(Map::new()),
            total_due: None,
        }
    }
}

/// The idempotent write for one enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentUpdate {
    pub status: EnrollmentStatus,
    /// Fills `accepted_at` only when empty.
    pub accepted_at: Option<Timestamp>,
    pub link: PaymentLink,
    pub preference_patch: Value,
    /// Fills `total_due` only when it is unset or zero.
    pub total_due_seed: Option<i64>,
}

impl EnrollmentUpdate {
    /// Plans the write for a payment in its current status.
    pub fn plan(payment: &Payment, now: Timestamp) -> Self {
        let preference_patch = preference_patch(payment, now);
        let link = PaymentLink::Link {
            payment_id: payment.id,
            snapshot: payment.snapshot(),
        };

        match payment.status {
            PaymentStatus::Paid => Self {
                status: EnrollmentStatus::Accepted,
                accepted_at: Some(now),
                link,
                preference_patch,
                total_due_seed: Some(payment.amount),
            },
            PaymentStatus::Canceled
            | PaymentStatus::Failed
            | PaymentStatus::Expired
            | PaymentStatus::Refunded
            | PaymentStatus::PartiallyRefunded => Self {
                status: EnrollmentStatus::AwaitingPayment,
                accepted_at: None,
                link: PaymentLink::Clear,
                preference_patch,
                total_due_seed: None,
            },
            PaymentStatus::Initiated | PaymentStatus::Pending | PaymentStatus::AwaitingCallback => {
                Self {
                    status: EnrollmentStatus::AwaitingPayment,
                    accepted_at: None,
                    link,
                    preference_patch,
                    total_due_seed: Some(payment.amount),
                }
            }
        }
    }

    /// Applies the write to a loaded row.
    pub fn apply_to(&self, record: &mut EnrollmentRecord) {
        record.status = self.status.clone();
        if record.accepted_at.is_none() {
            record.accepted_at = self.accepted_at;
        }
        match &self.link {
            PaymentLink::Link {
                payment_id,
                snapshot,
            } => {
                record.payment_id = Some(*payment_id);
                record.payment_snapshot = Some(snapshot.clone());
            }
            PaymentLink::Clear => {
                record.payment_id = None;
                record.payment_snapshot = None;
            }
        }
        deep_merge(&mut record.preferences, &self.preference_patch);
        if let Some(seed) = self.total_due_seed {
            if record.total_due.unwrap_or(0) == 0 {
                record.total_due = Some(seed);
            }
        }
    }
}

fn preference_patch(payment: &Payment, now: Timestamp) -> Value {
    let mut patch = Map::new();
    patch.insert(
        PREF_REGISTRATION.to_string(),
        json!({
            "payment_id": payment.id.to_string(),
            "payment_status": payment.status.as_str(),
            "amount": payment.amount,
            "updated_at": now.to_rfc3339(),
        }),
    );
    if let Some(payer_id) = payment.annotation.payer_id {
        patch.insert(PREF_PAYER_ID.to_string(), Value::String(payer_id.to_string()));
    }
    Value::Object(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{BillingKindId, TenantId, UserId};
    use crate::domain::payment::{
        GatewayProvider, ManualDetails, NewPayment, PaymentAnnotation, PaymentMethod,
        PaymentTarget,
    };

    fn payment(status: PaymentStatus, amount: i64) -> Payment {
        let mut annotation = PaymentAnnotation::default();
        annotation.payer_id = Some(UserId::new());
        let mut payment = Payment::initiate(
            NewPayment {
                id: PaymentId::new(),
                tenant_id: TenantId::new(),
                number: 7,
                target: PaymentTarget::BillingKind(BillingKindId::new()),
                amount,
                currency: "IDR".to_string(),
                method: PaymentMethod::Gateway,
                provider: Some(GatewayProvider::Midtrans),
                external_id: Some("REG-7".to_string()),
                manual: ManualDetails::default(),
                annotation,
            },
            Timestamp::now(),
        );
        payment.status = status;
        payment
    }

    #[test]
    fn paid_accepts_links_and_seeds() {
        let payment = payment(PaymentStatus::Paid, 250_000);
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        let now = Timestamp::now();

        EnrollmentUpdate::plan(&payment, now).apply_to(&mut record);

        assert_eq!(record.status, EnrollmentStatus::Accepted);
        assert_eq!(record.accepted_at, Some(now));
        assert_eq!(record.payment_id, Some(payment.id));
        assert_eq!(record.total_due, Some(250_000));
        assert_eq!(record.preferences["registration"]["payment_status"], "paid");
        assert_eq!(
            record.preferences["payer_id"],
            payment.annotation.payer_id.map(|id| id.to_string()).unwrap()
        );
    }

    #[test]
    fn total_due_is_seeded_once() {
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        EnrollmentUpdate::plan(&payment(PaymentStatus::Paid, 100), Timestamp::now())
            .apply_to(&mut record);
        EnrollmentUpdate::plan(&payment(PaymentStatus::Paid, 999), Timestamp::now())
            .apply_to(&mut record);

        assert_eq!(record.total_due, Some(100));
    }

    #[test]
    fn zero_total_due_counts_as_unset() {
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        record.total_due = Some(0);
        EnrollmentUpdate::plan(&payment(PaymentStatus::Pending, 500), Timestamp::now())
            .apply_to(&mut record);
        assert_eq!(record.total_due, Some(500));
    }

    #[test]
    fn accepted_at_is_first_write_wins() {
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        let first = Timestamp::now();
        EnrollmentUpdate::plan(&payment(PaymentStatus::Paid, 1), first).apply_to(&mut record);
        EnrollmentUpdate::plan(&payment(PaymentStatus::Paid, 1), first.plus_minutes(3))
            .apply_to(&mut record);
        assert_eq!(record.accepted_at, Some(first));
    }

    #[test]
    fn cancel_reverts_and_clears_link_but_merges_preferences() {
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        record.preferences = json!({ "shirt_size": "M" });
        EnrollmentUpdate::plan(&payment(PaymentStatus::Paid, 1), Timestamp::now())
            .apply_to(&mut record);

        let canceled = payment(PaymentStatus::Canceled, 1);
        EnrollmentUpdate::plan(&canceled, Timestamp::now()).apply_to(&mut record);

        assert_eq!(record.status, EnrollmentStatus::AwaitingPayment);
        assert!(record.payment_id.is_none());
        assert!(record.payment_snapshot.is_none());
        assert_eq!(record.preferences["shirt_size"], "M");
        assert_eq!(record.preferences["registration"]["payment_status"], "canceled");
    }

    #[test]
    fn pending_relinks_without_accepting() {
        let pending = payment(PaymentStatus::Pending, 10);
        let mut record = EnrollmentRecord::new(EnrollmentId::new());
        EnrollmentUpdate::plan(&pending, Timestamp::now()).apply_to(&mut record);

        assert_eq!(record.status, EnrollmentStatus::AwaitingPayment);
        assert_eq!(record.payment_id, Some(pending.id));
        assert!(record.accepted_at.is_none());
    }

    #[test]
    fn partial_refund_reverts_enrollment() {
        let update = EnrollmentUpdate::plan(
            &payment(PaymentStatus::PartiallyRefunded, 10),
            Timestamp::now(),
        );
        assert_eq!(update.status, EnrollmentStatus::AwaitingPayment);
        assert_eq!(update.link, PaymentLink::Clear);
    }

    #[test]
    fn unknown_status_round_trips() {
        let status = EnrollmentStatus::parse("withdrawn");
        assert_eq!(status.as_str(), "withdrawn");
    }
}
