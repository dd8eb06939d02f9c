//! Billing record writer port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::payment::PaymentTarget;
use crate::domain::propagation::BillingSync;

/// Writes the paid flag of student bills and general billing records.
#[async_trait]
pub trait BillingRecordWriter: Send + Sync {
    /// Apply a paid-state sync to the record a payment targets.
    ///
    /// Idempotent. Returns `false` when no live record matched; billing-kind
    /// targets never match.
    async fn sync_paid_state(
        &self,
        tenant_id: &TenantId,
        target: &PaymentTarget,
        sync: BillingSync,
    ) -> Result<bool, DomainError>;
}
