//! PostgreSQL implementation of TargetReader.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::payment::{PaymentTarget, TargetInfo};
use crate::ports::TargetReader;

/// Reads `student_bills`, `billings` and `billing_kinds`.
pub struct PostgresTargetReader {
    pool: PgPool,
}

impl PostgresTargetReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TargetRow {
    tenant_id: Uuid,
    amount: Option<i64>,
    active: bool,
}

#[async_trait]
impl TargetReader for PostgresTargetReader {
    async fn resolve(&self, target: &PaymentTarget) -> Result<Option<TargetInfo>, DomainError> {
        let (sql, id) = match target {
            PaymentTarget::StudentBill(id) => (
                "SELECT tenant_id, amount, TRUE AS active FROM student_bills \
                 WHERE id = $1 AND deleted_at IS NULL",
                *id.as_uuid(),
            ),
            PaymentTarget::Billing(id) => (
                "SELECT tenant_id, amount, TRUE AS active FROM billings \
                 WHERE id = $1 AND deleted_at IS NULL",
                *id.as_uuid(),
            ),
            PaymentTarget::BillingKind(id) => (
                "SELECT tenant_id, amount, is_active AS active FROM billing_kinds \
                 WHERE id = $1 AND deleted_at IS NULL",
                *id.as_uuid(),
            ),
        };

        let row: Option<TargetRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to resolve {}: {}", target.kind(), e))
            })?;

        Ok(row.map(|row| TargetInfo {
            tenant_id: TenantId::from_uuid(row.tenant_id),
            default_amount: row.amount,
            active: row.active,
        }))
    }
}
