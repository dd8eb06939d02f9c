//! Billing record synchronization.

use crate::domain::foundation::Timestamp;
use crate::domain::payment::PaymentStatus;

/// Write to perform on a billing record after a payment status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingSync {
    /// Flip to paid; `paid_at` only fills an empty column.
    MarkPaid { paid_at: Timestamp },
    /// Flip back to unpaid and clear `paid_at`.
    MarkUnpaid,
    NoChange,
}

impl BillingSync {
    /// `paid_at` is the payment's own paid stamp when it has one.
    pub fn for_status(status: PaymentStatus, paid_at: Timestamp) -> Self {
        match status {
            PaymentStatus::Paid => BillingSync::MarkPaid { paid_at },
            PaymentStatus::Canceled
            | PaymentStatus::Failed
            | PaymentStatus::Expired
            | PaymentStatus::Refunded => BillingSync::MarkUnpaid,
            _ => BillingSync::NoChange,
        }
    }
}

/// Paid flag of a billing record (student bill or general billing).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingPaidState {
    pub is_paid: bool,
    pub paid_at: Option<Timestamp>,
}

impl BillingPaidState {
    pub fn apply(&mut self, sync: BillingSync) {
        match sync {
            BillingSync::MarkPaid { paid_at } => {
                self.is_paid = true;
                if self.paid_at.is_none() {
                    self.paid_at = Some(paid_at);
                }
            }
            BillingSync::MarkUnpaid => {
                self.is_paid = false;
                self.paid_at = None;
            }
            BillingSync::NoChange => {}
        }
    }
}
