//! In-memory PaymentRepository.
//!
//! Behaves like the Postgres adapter: unique `(provider, external_id)` among
//! live rows, compare-and-swap on `version`, per-tenant counters. Failure
//! injection hooks let tests drive the error paths.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, TenantId};
use crate::domain::payment::{GatewayProvider, Payment};
use crate::ports::PaymentRepository;

/// In-memory payment store for tests and local runs.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: RwLock<HashMap<PaymentId, Payment>>,
    counters: Mutex<HashMap<TenantId, i64>>,
    faults: Mutex<Faults>,
}

#[derive(Default)]
struct Faults {
    /// Number of upcoming updates that fail with a version conflict.
    conflicts: u32,
    /// Number of upcoming updates that fail with a database error.
    update_failures: u32,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// The next `n` updates report a concurrent modification.
    pub async fn inject_conflicts(&self, n: u32) {
        self.faults.lock().await.conflicts = n;
    }

    /// The next `n` updates fail with a database error.
    pub async fn inject_update_failures(&self, n: u32) {
        self.faults.lock().await.update_failures = n;
    }

    /// Stored row regardless of tenant or deletion.
    pub async fn stored(&self, id: &PaymentId) -> Option<Payment> {
        self.payments.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

fn external_key(payment: &Payment) -> Option<(GatewayProvider, &str)> {
    match (payment.provider, payment.external_id.as_deref()) {
        (Some(provider), Some(external_id)) => Some((provider, external_id)),
        _ => None,
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.payments.write().await;

        if let Some(key) = external_key(payment) {
            let taken = payments
                .values()
                .any(|p| !p.is_deleted() && external_key(p) == Some(key));
            if taken {
                return Err(DomainError::new(
                    ErrorCode::DuplicateExternalId,
                    format!("external_id {} is already used", key.1),
                ));
            }
        }

        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        {
            let mut faults = self.faults.lock().await;
            if faults.update_failures > 0 {
                faults.update_failures -= 1;
                return Err(DomainError::database("simulated update failure"));
            }
            if faults.conflicts > 0 {
                faults.conflicts -= 1;
                return Err(DomainError::new(
                    ErrorCode::ConcurrencyConflict,
                    format!("payment {} was modified concurrently", payment.id),
                ));
            }
        }

        let mut payments = self.payments.write().await;
        let stored = payments.get_mut(&payment.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("payment {} not found", payment.id),
            )
        })?;

        if stored.version != payment.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrencyConflict,
                format!(
                    "payment {} is at version {}, update was based on {}",
                    payment.id, stored.version, payment.version
                ),
            ));
        }

        let mut next = payment.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &PaymentId,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .get(id)
            .filter(|p| &p.tenant_id == tenant_id && !p.is_deleted())
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| !p.is_deleted() && external_key(p) == Some((provider, external_id)))
            .cloned())
    }

    async fn next_number(&self, tenant_id: &TenantId) -> Result<i64, DomainError> {
        let mut counters = self.counters.lock().await;
        if !counters.contains_key(tenant_id) {
            // Seed from rows that predate the counter.
            let current_max = self
                .payments
                .read()
                .await
                .values()
                .filter(|p| &p.tenant_id == tenant_id)
                .map(|p| p.number)
                .max()
                .unwrap_or(0);
            counters.insert(*tenant_id, current_max);
        }
        let counter = counters.entry(*tenant_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{StudentBillId, Timestamp};
    use crate::domain::payment::{
        ManualDetails, NewPayment, PaymentAnnotation, PaymentMethod, PaymentTarget,
    };

    fn payment(tenant_id: TenantId, external_id: &str) -> Payment {
        Payment::initiate(
            NewPayment {
                id: PaymentId::new(),
                tenant_id,
                number: 1,
                target: PaymentTarget::StudentBill(StudentBillId::new()),
                amount: 1_000,
                currency: "IDR".to_string(),
                method: PaymentMethod::Gateway,
                provider: Some(GatewayProvider::Midtrans),
                external_id: Some(external_id.to_string()),
                manual: ManualDetails::default(),
                annotation: PaymentAnnotation::default(),
            },
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_external_id_is_rejected() {
        let repo = InMemoryPaymentRepository::new();
        let tenant = TenantId::new();
        repo.save(&payment(tenant, "INV-1")).await.unwrap();

        let err = repo.save(&payment(tenant, "INV-1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateExternalId);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let repo = InMemoryPaymentRepository::new();
        let p = payment(TenantId::new(), "INV-2");
        repo.save(&p).await.unwrap();

        repo.update(&p).await.unwrap();
        let err = repo.update(&p).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(repo.stored(&p.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn lookups_are_tenant_scoped() {
        let repo = InMemoryPaymentRepository::new();
        let p = payment(TenantId::new(), "INV-3");
        repo.save(&p).await.unwrap();

        assert!(repo.find_by_id(&TenantId::new(), &p.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&p.tenant_id, &p.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn numbers_are_per_tenant() {
        let repo = InMemoryPaymentRepository::new();
        let (a, b) = (TenantId::new(), TenantId::new());

        assert_eq!(repo.next_number(&a).await.unwrap(), 1);
        assert_eq!(repo.next_number(&a).await.unwrap(), 2);
        assert_eq!(repo.next_number(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn first_number_continues_after_existing_payments() {
        let repo = InMemoryPaymentRepository::new();
        let tenant = TenantId::new();
        let mut imported = payment(tenant, "INV-OLD");
        imported.number = 41;
        repo.save(&imported).await.unwrap();
        repo.save(&payment(TenantId::new(), "INV-ELSEWHERE")).await.unwrap();

        assert_eq!(repo.next_number(&tenant).await.unwrap(), 42);
        assert_eq!(repo.next_number(&tenant).await.unwrap(), 43);
    }
}
