//! PostgreSQL implementation of GatewayEventLedger.
//!
//! Dedup relies on the partial unique index
//! `gateway_events_provider_external_id_key`; the `ON CONFLICT` target below
//! repeats its predicate so Postgres can infer it as the arbiter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, GatewayEventId, PaymentId, Timestamp};
use crate::domain::gateway_event::{GatewayEvent, GatewayEventStatus};
use crate::domain::payment::GatewayProvider;
use crate::ports::{GatewayEventLedger, LedgerWrite};

const SELECT_COLUMNS: &str = r#"
    SELECT id, payment_id, provider, external_id, external_ref, raw_headers, raw_payload,
           raw_signature, raw_query, status, error, try_count, received_at, processed_at,
           deleted_at
    FROM gateway_events
"#;

pub struct PostgresGatewayEventLedger {
    pool: PgPool,
}

impl PostgresGatewayEventLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GatewayEventRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    provider: String,
    external_id: Option<String>,
    external_ref: Option<String>,
    raw_headers: Json<BTreeMap<String, String>>,
    raw_payload: String,
    raw_signature: Option<String>,
    raw_query: Option<String>,
    status: String,
    error: Option<String>,
    try_count: i32,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<GatewayEventRow> for GatewayEvent {
    type Error = DomainError;

    fn try_from(row: GatewayEventRow) -> Result<Self, Self::Error> {
        let provider: GatewayProvider = row.provider.parse().map_err(|e: String| {
            DomainError::database(format!("Invalid provider in gateway_events row: {}", e))
        })?;
        let status: GatewayEventStatus = row.status.parse().map_err(|e: String| {
            DomainError::database(format!("Invalid status in gateway_events row: {}", e))
        })?;

        Ok(GatewayEvent {
            id: GatewayEventId::from_uuid(row.id),
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            provider,
            external_id: row.external_id,
            external_ref: row.external_ref,
            raw_headers: row.raw_headers.0,
            raw_payload: row.raw_payload,
            raw_signature: row.raw_signature,
            raw_query: row.raw_query,
            status,
            error: row.error,
            try_count: row.try_count,
            received_at: Timestamp::from_datetime(row.received_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl GatewayEventLedger for PostgresGatewayEventLedger {
    async fn record(&self, event: GatewayEvent) -> Result<LedgerWrite, DomainError> {
        let conflict_clause = if event.is_dedup_candidate() {
            r#"
            ON CONFLICT (provider, external_id)
                WHERE deleted_at IS NULL AND status <> 'invalid_signature'
            DO UPDATE SET
                try_count = gateway_events.try_count + 1,
                payment_id = COALESCE(gateway_events.payment_id, EXCLUDED.payment_id)
            "#
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO gateway_events (
                id, payment_id, provider, external_id, external_ref, raw_headers, raw_payload,
                raw_signature, raw_query, status, error, try_count, received_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            {}
            RETURNING id, (xmax = 0) AS inserted
            "#,
            conflict_clause
        );

        let (id, inserted): (Uuid, bool) = sqlx::query_as(&sql)
            .bind(event.id.as_uuid())
            .bind(event.payment_id.map(|id| *id.as_uuid()))
            .bind(event.provider.as_str())
            .bind(&event.external_id)
            .bind(&event.external_ref)
            .bind(Json(&event.raw_headers))
            .bind(&event.raw_payload)
            .bind(&event.raw_signature)
            .bind(&event.raw_query)
            .bind(event.status.as_str())
            .bind(&event.error)
            .bind(event.try_count)
            .bind(event.received_at.as_datetime())
            .bind(event.processed_at.map(|t| *t.as_datetime()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to record gateway event: {}", e)))?;

        let id = GatewayEventId::from_uuid(id);
        Ok(if inserted {
            LedgerWrite::Inserted(id)
        } else {
            LedgerWrite::AlreadyRecorded(id)
        })
    }

    async fn mark(
        &self,
        id: GatewayEventId,
        status: GatewayEventStatus,
        error: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError> {
        let processed_at = status.is_final().then(|| *processed_at.as_datetime());

        sqlx::query(
            r#"
            UPDATE gateway_events SET
                status = $2,
                error = $3,
                processed_at = COALESCE($4, processed_at)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(error)
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update gateway event: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: GatewayEventId) -> Result<Option<GatewayEvent>, DomainError> {
        let sql = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<GatewayEventRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find gateway event: {}", e)))?;

        row.map(GatewayEvent::try_from).transpose()
    }

    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<GatewayEvent>, DomainError> {
        let sql = format!(
            "{} WHERE payment_id = $1 AND deleted_at IS NULL ORDER BY received_at, id",
            SELECT_COLUMNS
        );
        let rows: Vec<GatewayEventRow> = sqlx::query_as(&sql)
            .bind(payment_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to list gateway events: {}", e)))?;

        rows.into_iter().map(GatewayEvent::try_from).collect()
    }
}
