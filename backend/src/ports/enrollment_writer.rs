//! Enrollment writer port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EnrollmentId, TenantId};
use crate::domain::propagation::EnrollmentUpdate;

/// Applies payment-driven updates to enrollment rows.
///
/// Each call is one independent, idempotent write guarded by a not-deleted
/// predicate. Callers never batch several enrollments into one call.
#[async_trait]
pub trait EnrollmentWriter: Send + Sync {
    /// Returns `false` when the enrollment does not exist or is deleted.
    async fn apply(
        &self,
        tenant_id: &TenantId,
        enrollment_id: &EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<bool, DomainError>;
}
