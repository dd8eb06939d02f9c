//! PaymentStatusPropagator - pushes a payment's status into dependent records.
//!
//! Runs after every committed status change. Each write is independent: one
//! failing row never stops the others, and nothing here can undo the payment
//! change that triggered it. Failures are logged and reported, not returned.

use std::sync::Arc;

use crate::domain::foundation::{EnrollmentId, Timestamp};
use crate::domain::payment::Payment;
use crate::domain::propagation::{BillingSync, EnrollmentUpdate};
use crate::ports::{BillingRecordWriter, EnrollmentWriter};

/// Outcome of one dependent-record write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Updated,
    /// No live row matched.
    Missing,
    Failed(String),
}

/// What propagation did, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// `None` when the status implies no billing change or the target is a kind.
    pub billing: Option<RowOutcome>,
    pub enrollments: Vec<(EnrollmentId, RowOutcome)>,
}

impl PropagationReport {
    pub fn failures(&self) -> usize {
        let billing = matches!(self.billing, Some(RowOutcome::Failed(_))) as usize;
        billing
            + self
                .enrollments
                .iter()
                .filter(|(_, outcome)| matches!(outcome, RowOutcome::Failed(_)))
                .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }
}

/// Side-effect propagator.
#[derive(Clone)]
pub struct PaymentStatusPropagator {
    billing: Arc<dyn BillingRecordWriter>,
    enrollments: Arc<dyn EnrollmentWriter>,
}

impl PaymentStatusPropagator {
    pub fn new(billing: Arc<dyn BillingRecordWriter>, enrollments: Arc<dyn EnrollmentWriter>) -> Self {
        Self {
            billing,
            enrollments,
        }
    }

    pub async fn propagate(&self, payment: &Payment) -> PropagationReport {
        let now = Timestamp::now();
        let report = PropagationReport {
            billing: self.sync_billing(payment, now).await,
            enrollments: self.sync_enrollments(payment, now).await,
        };

        if report.is_clean() {
            tracing::debug!(
                payment_id = %payment.id,
                status = %payment.status,
                enrollments = report.enrollments.len(),
                "Payment status propagated"
            );
        } else {
            tracing::warn!(
                payment_id = %payment.id,
                status = %payment.status,
                failures = report.failures(),
                "Payment status propagated with failures"
            );
        }
        report
    }

    async fn sync_billing(&self, payment: &Payment, now: Timestamp) -> Option<RowOutcome> {
        if !payment.target.is_billing_record() {
            return None;
        }
        let paid_at = payment.timestamps.paid_at.unwrap_or(now);
        let sync = BillingSync::for_status(payment.status, paid_at);
        if sync == BillingSync::NoChange {
            return None;
        }

        let outcome = match self
            .billing
            .sync_paid_state(&payment.tenant_id, &payment.target, sync)
            .await
        {
            Ok(true) => RowOutcome::Updated,
            Ok(false) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    target = payment.target.kind(),
                    "Billing record not found during propagation"
                );
                RowOutcome::Missing
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    target = payment.target.kind(),
                    error = %e,
                    "Failed to sync billing record"
                );
                RowOutcome::Failed(e.to_string())
            }
        };
        Some(outcome)
    }

    async fn sync_enrollments(
        &self,
        payment: &Payment,
        now: Timestamp,
    ) -> Vec<(EnrollmentId, RowOutcome)> {
        let ids = payment.annotation.registration_enrollments();
        if ids.is_empty() {
            return Vec::new();
        }

        let update = EnrollmentUpdate::plan(payment, now);
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.enrollments.apply(&payment.tenant_id, &id, &update).await {
                Ok(true) => RowOutcome::Updated,
                Ok(false) => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        enrollment_id = %id,
                        "Enrollment not found during propagation"
                    );
                    RowOutcome::Missing
                }
                Err(e) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        enrollment_id = %id,
                        error = %e,
                        "Failed to sync enrollment"
                    );
                    RowOutcome::Failed(e.to_string())
                }
            };
            outcomes.push((id, outcome));
        }
        outcomes
    }
}
