//! PatchPaymentHandler - Command handler for staff corrections.
//!
//! Every field is a [`Patch`]: absent fields are left alone, explicit nulls
//! clear, values replace. Explicit timestamp values overwrite first-write-wins
//! stamps. A status change runs the same propagation as a gateway callback.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::foundation::{Patch, PaymentId, TenantId, Timestamp, UserId};
use crate::domain::payment::{
    Payment, PaymentAnnotation, PaymentError, PaymentStatus, StampField,
};
use crate::ports::PaymentRepository;

use super::propagate_payment_status::{PaymentStatusPropagator, PropagationReport};

/// Command to patch a payment.
#[derive(Debug, Clone, Default)]
pub struct PatchPaymentCommand {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub actor: Option<UserId>,
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

impl PatchPaymentCommand {
    fn touches_manual_fields(&self) -> bool {
        !(self.manual_channel.is_unset()
            && self.manual_reference.is_unset()
            && self.verified_by.is_unset()
            && self.verified_at.is_unset())
    }
}

/// Result of a patch.
#[derive(Debug, Clone)]
pub struct PatchPaymentResult {
    pub payment: Payment,
    /// Present when the patch carried a status.
    pub propagation: Option<PropagationReport>,
}

/// Handler for patching payments.
pub struct PatchPaymentHandler {
    repository: Arc<dyn PaymentRepository>,
    propagator: PaymentStatusPropagator,
}

impl PatchPaymentHandler {
    pub fn new(repository: Arc<dyn PaymentRepository>, propagator: PaymentStatusPropagator) -> Self {
        Self {
            repository,
            propagator,
        }
    }

    pub async fn handle(&self, cmd: PatchPaymentCommand) -> Result<PatchPaymentResult, PaymentError> {
        let mut payment = self
            .repository
            .find_by_id(&cmd.tenant_id, &cmd.payment_id)
            .await?
            .ok_or(PaymentError::NotFound(cmd.payment_id))?;

        if payment.method.is_gateway() && cmd.touches_manual_fields() {
            return Err(PaymentError::validation(
                "manual",
                "manual fields are only allowed for non-gateway payments",
            ));
        }
        if let Some(amount) = cmd.amount {
            if amount < 0 || (payment.method.is_gateway() && amount == 0) {
                return Err(PaymentError::validation(
                    "amount",
                    "amount must be non-negative, and positive for gateway payments",
                ));
            }
            payment.amount = amount;
        }

        let now = Timestamp::now();
        let status_patched = cmd.status.is_some();
        if let Some(status) = cmd.status {
            let change = if status == PaymentStatus::Paid && !payment.method.is_gateway() {
                payment.mark_paid_manually(cmd.actor, now)
            } else {
                payment.change_status(status, now)
            };
            if change.off_graph {
                tracing::warn!(
                    payment_id = %payment.id,
                    from = %change.previous,
                    to = %change.current,
                    "Off-lifecycle status change applied by patch"
                );
            }
        }

        cmd.gateway_reference.apply_to(&mut payment.gateway_reference);
        cmd.checkout_url.apply_to(&mut payment.checkout_url);
        cmd.manual_channel.apply_to(&mut payment.manual.channel);
        cmd.manual_reference.apply_to(&mut payment.manual.reference);
        cmd.verified_by.apply_to(&mut payment.manual.verified_by);
        cmd.verified_at.apply_to(&mut payment.manual.verified_at);
        cmd.expires_at.apply_to(&mut payment.timestamps.expires_at);
        overwrite_stamp(&mut payment, StampField::PaidAt, cmd.paid_at);
        overwrite_stamp(&mut payment, StampField::CanceledAt, cmd.canceled_at);
        overwrite_stamp(&mut payment, StampField::FailedAt, cmd.failed_at);
        overwrite_stamp(&mut payment, StampField::RefundedAt, cmd.refunded_at);
        match cmd.meta {
            Patch::Unset => {}
            Patch::Null => payment.annotation = PaymentAnnotation::default(),
            Patch::Value(raw) => payment.annotation = PaymentAnnotation::decode(Some(&raw)),
        }
        payment.updated_at = now;

        self.repository.update(&payment).await.map_err(|e| {
            if e.is_conflict() {
                PaymentError::Conflict(payment.id)
            } else {
                PaymentError::from(e)
            }
        })?;
        payment.version += 1;

        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            status_patched,
            "Payment patched"
        );

        let propagation = if status_patched {
            Some(self.propagator.propagate(&payment).await)
        } else {
            None
        };

        Ok(PatchPaymentResult {
            payment,
            propagation,
        })
    }
}

fn overwrite_stamp(payment: &mut Payment, field: StampField, patch: Patch<Timestamp>) {
    match patch {
        Patch::Unset => {}
        Patch::Null => payment.timestamps.overwrite(field, None),
        Patch::Value(at) => payment.timestamps.overwrite(field, Some(at)),
    }
}
