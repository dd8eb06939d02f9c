//! PostgreSQL implementation of BillingRecordWriter.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::payment::PaymentTarget;
use crate::domain::propagation::BillingSync;
use crate::ports::BillingRecordWriter;

pub struct PostgresBillingRecordWriter {
    pool: PgPool,
}

impl PostgresBillingRecordWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn table_for(target: &PaymentTarget) -> Option<(&'static str, uuid::Uuid)> {
    match target {
        PaymentTarget::StudentBill(id) => Some(("student_bills", *id.as_uuid())),
        PaymentTarget::Billing(id) => Some(("billings", *id.as_uuid())),
        PaymentTarget::BillingKind(_) => None,
    }
}

#[async_trait]
impl BillingRecordWriter for PostgresBillingRecordWriter {
    async fn sync_paid_state(
        &self,
        tenant_id: &TenantId,
        target: &PaymentTarget,
        sync: BillingSync,
    ) -> Result<bool, DomainError> {
        let Some((table, id)) = table_for(target) else {
            return Ok(false);
        };

        let (sql, paid_at) = match sync {
            BillingSync::NoChange => return Ok(false),
            BillingSync::MarkPaid { paid_at } => (
                format!(
                    "UPDATE {} SET is_paid = TRUE, paid_at = COALESCE(paid_at, $3) \
                     WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
                    table
                ),
                Some(*paid_at.as_datetime()),
            ),
            BillingSync::MarkUnpaid => (
                format!(
                    "UPDATE {} SET is_paid = FALSE, paid_at = NULL \
                     WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
                    table
                ),
                None,
            ),
        };

        let mut query = sqlx::query(&sql).bind(id).bind(tenant_id.as_uuid());
        if let Some(paid_at) = paid_at {
            query = query.bind(paid_at);
        }
        let result = query.execute(&self.pool).await.map_err(|e| {
            DomainError::database(format!("Failed to sync {} paid state: {}", table, e))
        })?;
        Ok(result.rows_affected() > 0)
    }
}
