//! Target reader port.
//!
//! Read-only view of the billing objects payments settle. Those tables are
//! owned by the billing module.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::{PaymentTarget, TargetInfo};

#[async_trait]
pub trait TargetReader: Send + Sync {
    /// Look up a live target.
    ///
    /// Returns `None` if the target does not exist or is soft-deleted.
    async fn resolve(&self, target: &PaymentTarget) -> Result<Option<TargetInfo>, DomainError>;
}
