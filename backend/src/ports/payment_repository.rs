//! Payment repository port.
//!
//! Defines the contract for persisting and retrieving Payment aggregates.
//!
//! # Design
//!
//! - **Tenant scoped**: staff-facing lookups always carry the tenant
//! - **Optimistic locking**: `update` is a compare-and-swap on `version`
//! - **Soft delete only**: deleted payments are hidden, never purged

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, TenantId};
use crate::domain::payment::{GatewayProvider, Payment};

/// Repository port for Payment aggregate persistence.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Save a new payment.
    ///
    /// # Errors
    ///
    /// - `DuplicateExternalId` if `(provider, external_id)` is already taken
    /// - `DatabaseError` on persistence failure
    async fn save(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Update an existing payment.
    ///
    /// Succeeds only while the stored row still has `payment.version`; the
    /// stored version becomes `payment.version + 1`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the row was changed since it was read
    /// - `PaymentNotFound` if the row does not exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Find a live payment by id within a tenant.
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &PaymentId,
    ) -> Result<Option<Payment>, DomainError>;

    /// Find a live payment by the order id it was registered with at the gateway.
    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Allocate the next display number for a tenant.
    ///
    /// Monotonic per tenant; numbers from failed creates are not reused.
    async fn next_number(&self, tenant_id: &TenantId) -> Result<i64, DomainError>;
}
