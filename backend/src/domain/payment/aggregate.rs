//! Payment aggregate entity.
//!
//! A Payment is one attempt to collect funds against a billing target. Its
//! status only moves through [`Payment::begin_checkout`], gateway
//! notifications ([`Payment::apply_notification`]) or an explicit staff
//! correction ([`Payment::change_status`]).
//!
//! # Design Decisions
//!
//! - **Money in minor units**: amounts are `i64`, never floats
//! - **First write wins**: lifecycle timestamps are stamped once; only an
//!   explicit manual correction overwrites them
//! - **Optimistic locking**: `version` is compared-and-swapped by the store

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::foundation::{PaymentId, StateMachine, TenantId, Timestamp, UserId};

use super::annotation::PaymentAnnotation;
use super::errors::PaymentError;
use super::notification::{ChannelSnapshot, GatewayNotification};
use super::status::{GatewayProvider, PaymentMethod, PaymentStatus};
use super::status_mapper::{map_transaction_status, FraudStatus, StampField, TransactionStatus};
use super::target::PaymentTarget;

/// Staff-entered details for non-gateway payments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualDetails {
    pub channel: Option<String>,
    pub reference: Option<String>,
    pub recorded_by: Option<UserId>,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<Timestamp>,
}

impl ManualDetails {
    pub fn is_empty(&self) -> bool {
        self == &ManualDetails::default()
    }
}

/// Lifecycle timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTimestamps {
    pub requested_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
}

impl PaymentTimestamps {
    fn new(requested_at: Timestamp) -> Self {
        Self {
            requested_at,
            expires_at: None,
            paid_at: None,
            canceled_at: None,
            failed_at: None,
            refunded_at: None,
        }
    }

    fn slot(&mut self, field: StampField) -> &mut Option<Timestamp> {
        match field {
            StampField::PaidAt => &mut self.paid_at,
            StampField::FailedAt => &mut self.failed_at,
            StampField::CanceledAt => &mut self.canceled_at,
            StampField::RefundedAt => &mut self.refunded_at,
        }
    }

    /// Sets the field unless it already holds a value. Returns true if it was set.
    pub fn stamp(&mut self, field: StampField, at: Timestamp) -> bool {
        let slot = self.slot(field);
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }

    /// Manual correction; replaces whatever was there.
    pub fn overwrite(&mut self, field: StampField, at: Option<Timestamp>) {
        *self.slot(field) = at;
    }
}

/// Inputs for a new payment. Validation happens in the create handler.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub number: i64,
    pub target: PaymentTarget,
    pub amount: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub provider: Option<GatewayProvider>,
    pub external_id: Option<String>,
    pub manual: ManualDetails,
    pub annotation: PaymentAnnotation,
}

/// What a status change did to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: PaymentStatus,
    pub current: PaymentStatus,
    pub stamped: Option<StampField>,
    /// The provider status was understood by the mapper.
    pub recognized: bool,
    /// The move is not an edge of the lifecycle graph. Applied anyway.
    pub off_graph: bool,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Payment aggregate.
///
/// # Invariants
///
/// - exactly one target
/// - `amount >= 0`, in minor units of `currency`
/// - gateway payments carry `provider` and `external_id`; others carry neither provider
///   nor gateway-only fields
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    /// Per-tenant display number.
    pub number: i64,
    pub target: PaymentTarget,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub provider: Option<GatewayProvider>,
    /// Merchant order id sent to the gateway; the idempotency key.
    pub external_id: Option<String>,
    /// Provider transaction id, refreshed on every notification that carries one.
    pub gateway_reference: Option<String>,
    pub checkout_token: Option<String>,
    pub checkout_url: Option<String>,
    pub instrument: ChannelSnapshot,
    pub manual: ManualDetails,
    pub timestamps: PaymentTimestamps,
    pub annotation: PaymentAnnotation,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub version: i32,
}

impl Payment {
    /// Creates a payment in `initiated`, stamping `requested_at`.
    pub fn initiate(new: NewPayment, now: Timestamp) -> Self {
        Self {
            id: new.id,
            tenant_id: new.tenant_id,
            number: new.number,
            target: new.target,
            amount: new.amount,
            currency: new.currency,
            status: PaymentStatus::Initiated,
            method: new.method,
            provider: new.provider,
            external_id: new.external_id,
            gateway_reference: None,
            checkout_token: None,
            checkout_url: None,
            instrument: ChannelSnapshot::default(),
            manual: new.manual,
            timestamps: PaymentTimestamps::new(now),
            annotation: new.annotation,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    /// Records a checkout token and moves to `pending`.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the payment is not a gateway payment or its
    /// current status cannot move to `pending`.
    pub fn begin_checkout(
        &mut self,
        token: String,
        redirect_url: Option<String>,
        expires_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<(), PaymentError> {
        if !self.method.is_gateway() {
            return Err(PaymentError::validation(
                "method",
                "checkout is only available for gateway payments",
            ));
        }
        self.status = self
            .status
            .transition_to(PaymentStatus::Pending)
            .map_err(|e| PaymentError::validation("status", e.to_string()))?;
        self.checkout_token = Some(token);
        self.checkout_url = redirect_url;
        self.timestamps.expires_at = expires_at;
        self.updated_at = now;
        Ok(())
    }

    /// Applies a verified gateway notification.
    ///
    /// Unrecognized provider statuses leave status, stamps and amount alone;
    /// the gateway reference and channel snapshot are still refreshed.
    pub fn apply_notification(
        &mut self,
        notification: &GatewayNotification,
        now: Timestamp,
    ) -> StatusChange {
        let previous = self.status;
        let mapping = map_transaction_status(
            &TransactionStatus::parse(&notification.transaction_status),
            FraudStatus::parse(notification.fraud_status.as_deref()),
        );
        let recognized = mapping.is_some();

        let mut stamped = None;
        if let Some(mapping) = mapping {
            self.status = mapping.status;
            if let Some(field) = mapping.stamp {
                if self.timestamps.stamp(field, now) {
                    stamped = Some(field);
                }
            }
            if let Some(amount) = notification.gross_amount_minor() {
                self.amount = amount;
            }
        }

        if let Some(reference) = notification
            .transaction_id
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            self.gateway_reference = Some(reference.to_string());
        }

        let snapshot = notification.channel_snapshot();
        if !snapshot.is_empty() {
            self.instrument = snapshot;
        }

        self.updated_at = now;
        StatusChange {
            previous,
            current: self.status,
            stamped,
            recognized,
            off_graph: is_off_graph(previous, self.status),
        }
    }

    /// Staff-driven status change (PATCH or manual-paid creation).
    ///
    /// Stamps the implied timestamp first-write-wins.
    pub fn change_status(&mut self, status: PaymentStatus, now: Timestamp) -> StatusChange {
        let previous = self.status;
        self.status = status;

        let mut stamped = None;
        if let Some(field) = StampField::implied_by(status) {
            if self.timestamps.stamp(field, now) {
                stamped = Some(field);
            }
        }

        self.updated_at = now;
        StatusChange {
            previous,
            current: status,
            stamped,
            recognized: true,
            off_graph: is_off_graph(previous, status),
        }
    }

    /// Marks a non-gateway payment as paid and verified.
    pub fn mark_paid_manually(&mut self, verified_by: Option<UserId>, now: Timestamp) -> StatusChange {
        let change = self.change_status(PaymentStatus::Paid, now);
        if self.manual.verified_at.is_none() {
            self.manual.verified_at = Some(now);
        }
        if self.manual.verified_by.is_none() {
            self.manual.verified_by = verified_by;
        }
        change
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Compact representation cached on dependent records.
    pub fn snapshot(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "number": self.number,
            "status": self.status.as_str(),
            "amount": self.amount,
            "currency": self.currency,
            "method": self.method.as_str(),
            "gateway_reference": self.gateway_reference,
            "paid_at": self.timestamps.paid_at.map(|t| t.to_rfc3339()),
        })
    }
}

fn is_off_graph(previous: PaymentStatus, current: PaymentStatus) -> bool {
    previous != current && !previous.can_transition_to(&current)
}
