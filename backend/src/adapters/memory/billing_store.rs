//! In-memory billing targets.
//!
//! Stands in for the billing module's tables: answers target lookups and
//! takes paid-state writes for bills and billing records.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{
    BillingId, BillingKindId, DomainError, StudentBillId, TenantId,
};
use crate::domain::payment::{PaymentTarget, TargetInfo};
use crate::domain::propagation::{BillingPaidState, BillingSync};
use crate::ports::{BillingRecordWriter, TargetReader};

struct StoredTarget {
    info: TargetInfo,
    paid: BillingPaidState,
}

#[derive(Default)]
pub struct InMemoryBillingStore {
    targets: RwLock<HashMap<PaymentTarget, StoredTarget>>,
    failing: Mutex<HashSet<PaymentTarget>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student_bill(&self, tenant_id: TenantId, amount: i64) -> StudentBillId {
        let id = StudentBillId::new();
        self.insert(PaymentTarget::StudentBill(id), tenant_id, Some(amount), true)
            .await;
        id
    }

    pub async fn add_billing(&self, tenant_id: TenantId, amount: i64) -> BillingId {
        let id = BillingId::new();
        self.insert(PaymentTarget::Billing(id), tenant_id, Some(amount), true)
            .await;
        id
    }

    pub async fn add_billing_kind(
        &self,
        tenant_id: TenantId,
        amount: Option<i64>,
        active: bool,
    ) -> BillingKindId {
        let id = BillingKindId::new();
        self.insert(PaymentTarget::BillingKind(id), tenant_id, amount, active)
            .await;
        id
    }

    async fn insert(
        &self,
        target: PaymentTarget,
        tenant_id: TenantId,
        default_amount: Option<i64>,
        active: bool,
    ) {
        self.targets.write().await.insert(
            target,
            StoredTarget {
                info: TargetInfo {
                    tenant_id,
                    default_amount,
                    active,
                },
                paid: BillingPaidState::default(),
            },
        );
    }

    // === Test Helpers ===

    pub async fn paid_state(&self, target: &PaymentTarget) -> Option<BillingPaidState> {
        self.targets.read().await.get(target).map(|t| t.paid)
    }

    /// Writes to `target` fail until cleared.
    pub async fn fail_writes_for(&self, target: PaymentTarget) {
        self.failing.lock().await.insert(target);
    }
}

#[async_trait]
impl TargetReader for InMemoryBillingStore {
    async fn resolve(&self, target: &PaymentTarget) -> Result<Option<TargetInfo>, DomainError> {
        Ok(self.targets.read().await.get(target).map(|t| t.info.clone()))
    }
}

#[async_trait]
impl BillingRecordWriter for InMemoryBillingStore {
    async fn sync_paid_state(
        &self,
        tenant_id: &TenantId,
        target: &PaymentTarget,
        sync: BillingSync,
    ) -> Result<bool, DomainError> {
        if !target.is_billing_record() {
            return Ok(false);
        }
        if self.failing.lock().await.contains(target) {
            return Err(DomainError::database("simulated billing write failure"));
        }

        let mut targets = self.targets.write().await;
        match targets.get_mut(target) {
            Some(stored) if &stored.info.tenant_id == tenant_id => {
                stored.paid.apply(sync);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
