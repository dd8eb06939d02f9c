//! PostgreSQL implementation of EnrollmentWriter.
//!
//! Each enrollment is locked, updated in memory with
//! [`EnrollmentUpdate::apply_to`] and written back inside its own transaction,
//! so the deep-merge of preferences and the first-write-wins columns behave
//! exactly as in the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EnrollmentId, PaymentId, TenantId, Timestamp};
use crate::domain::propagation::{EnrollmentRecord, EnrollmentStatus, EnrollmentUpdate};
use crate::ports::EnrollmentWriter;

pub struct PostgresEnrollmentWriter {
    pool: PgPool,
}

impl PostgresEnrollmentWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    status: String,
    accepted_at: Option<DateTime<Utc>>,
    payment_id: Option<Uuid>,
    payment_snapshot: Option<Value>,
    preferences: Value,
    total_due: Option<i64>,
}

impl From<EnrollmentRow> for EnrollmentRecord {
    fn from(row: EnrollmentRow) -> Self {
        EnrollmentRecord {
            id: EnrollmentId::from_uuid(row.id),
            status: EnrollmentStatus::parse(&row.status),
            accepted_at: row.accepted_at.map(Timestamp::from_datetime),
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            payment_snapshot: row.payment_snapshot,
            preferences: row.preferences,
            total_due: row.total_due,
        }
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {} enrollment: {}", action, e))
}

#[async_trait]
impl EnrollmentWriter for PostgresEnrollmentWriter {
    async fn apply(
        &self,
        tenant_id: &TenantId,
        enrollment_id: &EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<bool, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("begin", e))?;

        let row: Option<EnrollmentRow> = sqlx::query_as(
            r#"
            SELECT id, status, accepted_at, payment_id, payment_snapshot, preferences, total_due
            FROM enrollments
            WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(enrollment_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock", e))?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut record = EnrollmentRecord::from(row);
        update.apply_to(&mut record);

        sqlx::query(
            r#"
            UPDATE enrollments SET
                status = $2,
                accepted_at = $3,
                payment_id = $4,
                payment_snapshot = $5,
                preferences = $6,
                total_due = $7
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(record.accepted_at.map(|t| *t.as_datetime()))
        .bind(record.payment_id.map(|id| *id.as_uuid()))
        .bind(&record.payment_snapshot)
        .bind(&record.preferences)
        .bind(record.total_due)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update", e))?;

        tx.commit().await.map_err(|e| db_error("commit", e))?;
        Ok(true)
    }
}
