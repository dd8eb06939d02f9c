//! Ledger entry for one inbound gateway delivery.
//!
//! Entries are written before any payment is touched and are never edited
//! afterwards except to record how processing ended.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{GatewayEventId, PaymentId, Timestamp};
use crate::domain::payment::{GatewayNotification, GatewayProvider};

use super::status::GatewayEventStatus;

/// A delivery exactly as it reached the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDelivery {
    pub headers: BTreeMap<String, String>,
    pub query: Option<String>,
    pub body: Vec<u8>,
}

impl RawDelivery {
    pub fn new(headers: BTreeMap<String, String>, query: Option<String>, body: &[u8]) -> Self {
        Self {
            headers,
            query,
            body: body.to_vec(),
        }
    }

    /// The body as text, or why it is not valid UTF-8.
    pub fn body_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// One row of the gateway event ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: GatewayEventId,
    /// Absent when the delivery matched no payment.
    pub payment_id: Option<PaymentId>,
    pub provider: GatewayProvider,
    /// Order id from the notification; absent when the body did not parse.
    pub external_id: Option<String>,
    /// Provider transaction id.
    pub external_ref: Option<String>,
    pub raw_headers: BTreeMap<String, String>,
    pub raw_payload: String,
    pub raw_signature: Option<String>,
    pub raw_query: Option<String>,
    pub status: GatewayEventStatus,
    pub error: Option<String>,
    pub try_count: i32,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
}

impl GatewayEvent {
    /// A fresh `received` entry for a delivery.
    pub fn arrived(provider: GatewayProvider, delivery: RawDelivery, now: Timestamp) -> Self {
        Self {
            id: GatewayEventId::new(),
            payment_id: None,
            provider,
            external_id: None,
            external_ref: None,
            raw_headers: delivery.headers,
            raw_payload: String::from_utf8_lossy(&delivery.body).into_owned(),
            raw_signature: None,
            raw_query: delivery.query,
            status: GatewayEventStatus::Received,
            error: None,
            try_count: 1,
            received_at: now,
            processed_at: None,
            deleted_at: None,
        }
    }

    /// Copies the correlation fields out of a parsed notification.
    pub fn with_notification(mut self, notification: &GatewayNotification) -> Self {
        self.external_id = Some(notification.order_id.clone());
        self.external_ref = notification.transaction_id.clone();
        self.raw_signature = notification.signature_key.clone();
        self
    }

    pub fn with_payment(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }

    /// Sets the status; final statuses also stamp `processed_at`.
    pub fn with_status(
        mut self,
        status: GatewayEventStatus,
        error: Option<String>,
        now: Timestamp,
    ) -> Self {
        self.status = status;
        self.error = error;
        if status.is_final() {
            self.processed_at = Some(now);
        }
        self
    }

    /// Closes out a delivery that matched no payment. The status stays
    /// `received`; the note and `processed_at` record that handling finished.
    pub fn unmatched(mut self, note: impl Into<String>, now: Timestamp) -> Self {
        self.error = Some(note.into());
        self.processed_at = Some(now);
        self
    }

    /// Whether this entry takes part in `(provider, external_id)` dedup.
    ///
    /// Rejected deliveries always get their own row so that a forged
    /// notification can never shadow the genuine one.
    pub fn is_dedup_candidate(&self) -> bool {
        self.external_id.is_some() && self.status != GatewayEventStatus::InvalidSignature
    }
}
