//! In-memory enrollment rows.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{DomainError, EnrollmentId, TenantId};
use crate::domain::propagation::{EnrollmentRecord, EnrollmentUpdate};
use crate::ports::EnrollmentWriter;

struct StoredEnrollment {
    tenant_id: TenantId,
    record: EnrollmentRecord,
    deleted: bool,
}

#[derive(Default)]
pub struct InMemoryEnrollmentStore {
    rows: RwLock<HashMap<EnrollmentId, StoredEnrollment>>,
    failing: Mutex<HashSet<EnrollmentId>>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, tenant_id: TenantId, record: EnrollmentRecord) {
        self.rows.write().await.insert(
            record.id,
            StoredEnrollment {
                tenant_id,
                record,
                deleted: false,
            },
        );
    }

    /// Adds a fresh enrollment awaiting payment.
    pub async fn add(&self, tenant_id: TenantId) -> EnrollmentId {
        let id = EnrollmentId::new();
        self.insert(tenant_id, EnrollmentRecord::new(id)).await;
        id
    }

    pub async fn soft_delete(&self, id: &EnrollmentId) {
        if let Some(row) = self.rows.write().await.get_mut(id) {
            row.deleted = true;
        }
    }

    // === Test Helpers ===

    pub async fn get(&self, id: &EnrollmentId) -> Option<EnrollmentRecord> {
        self.rows.read().await.get(id).map(|row| row.record.clone())
    }

    /// Writes to `id` fail until the store is dropped.
    pub async fn fail_writes_for(&self, id: EnrollmentId) {
        self.failing.lock().await.insert(id);
    }
}

#[async_trait]
impl EnrollmentWriter for InMemoryEnrollmentStore {
    async fn apply(
        &self,
        tenant_id: &TenantId,
        enrollment_id: &EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<bool, DomainError> {
        if self.failing.lock().await.contains(enrollment_id) {
            return Err(DomainError::database(format!(
                "simulated failure writing enrollment {}",
                enrollment_id
            )));
        }

        let mut rows = self.rows.write().await;
        match rows.get_mut(enrollment_id) {
            Some(row) if !row.deleted && &row.tenant_id == tenant_id => {
                update.apply_to(&mut row.record);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
