//! PostgreSQL implementation of PaymentRepository.
//!
//! Updates are a compare-and-swap on `(id, version)`; zero affected rows means
//! either the payment is gone or another writer got there first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    BillingId, BillingKindId, DomainError, ErrorCode, PaymentId, StudentBillId, TenantId,
    Timestamp, UserId,
};
use crate::domain::payment::{
    ChannelSnapshot, GatewayProvider, ManualDetails, Payment, PaymentAnnotation, PaymentMethod,
    PaymentStatus, PaymentTarget, PaymentTimestamps,
};
use crate::ports::PaymentRepository;

const EXTERNAL_ID_CONSTRAINT: &str = "payments_provider_external_id_key";

const SELECT_COLUMNS: &str = r#"
    SELECT id, tenant_id, number, student_bill_id, billing_id, billing_kind_id,
           amount, currency, status, method, provider, external_id,
           gateway_reference, checkout_token, checkout_url,
           payment_type, bank, va_number, store, payment_code,
           manual_channel, manual_reference, recorded_by, verified_by, verified_at,
           requested_at, expires_at, paid_at, canceled_at, failed_at, refunded_at,
           meta, created_at, updated_at, deleted_at, version
    FROM payments
"#;

/// Advances the tenant counter. A missing counter row starts after the
/// tenant's highest existing number.
const NEXT_NUMBER_SQL: &str = r#"
    INSERT INTO payment_number_sequences (tenant_id, last_number)
    VALUES ($1, (SELECT COALESCE(MAX(number), 0) + 1 FROM payments WHERE tenant_id = $1))
    ON CONFLICT (tenant_id)
    DO UPDATE SET last_number = payment_number_sequences.last_number + 1
    RETURNING last_number
"#;

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    tenant_id: Uuid,
    number: i64,
    student_bill_id: Option<Uuid>,
    billing_id: Option<Uuid>,
    billing_kind_id: Option<Uuid>,
    amount: i64,
    currency: String,
    status: String,
    method: String,
    provider: Option<String>,
    external_id: Option<String>,
    gateway_reference: Option<String>,
    checkout_token: Option<String>,
    checkout_url: Option<String>,
    payment_type: Option<String>,
    bank: Option<String>,
    va_number: Option<String>,
    store: Option<String>,
    payment_code: Option<String>,
    manual_channel: Option<String>,
    manual_reference: Option<String>,
    recorded_by: Option<Uuid>,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    requested_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    meta: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: i32,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let target = PaymentTarget::from_parts(
            row.student_bill_id.map(StudentBillId::from_uuid),
            row.billing_id.map(BillingId::from_uuid),
            row.billing_kind_id.map(BillingKindId::from_uuid),
        )
        .map_err(|e| corrupt("target", e))?;
        let status: PaymentStatus = row.status.parse().map_err(|e| corrupt("status", e))?;
        let method: PaymentMethod = row.method.parse().map_err(|e| corrupt("method", e))?;
        let provider = row
            .provider
            .as_deref()
            .map(str::parse::<GatewayProvider>)
            .transpose()
            .map_err(|e| corrupt("provider", e))?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            number: row.number,
            target,
            amount: row.amount,
            currency: row.currency,
            status,
            method,
            provider,
            external_id: row.external_id,
            gateway_reference: row.gateway_reference,
            checkout_token: row.checkout_token,
            checkout_url: row.checkout_url,
            instrument: ChannelSnapshot {
                payment_type: row.payment_type,
                bank: row.bank,
                va_number: row.va_number,
                store: row.store,
                payment_code: row.payment_code,
            },
            manual: ManualDetails {
                channel: row.manual_channel,
                reference: row.manual_reference,
                recorded_by: row.recorded_by.map(UserId::from_uuid),
                verified_by: row.verified_by.map(UserId::from_uuid),
                verified_at: row.verified_at.map(Timestamp::from_datetime),
            },
            timestamps: PaymentTimestamps {
                requested_at: Timestamp::from_datetime(row.requested_at),
                expires_at: row.expires_at.map(Timestamp::from_datetime),
                paid_at: row.paid_at.map(Timestamp::from_datetime),
                canceled_at: row.canceled_at.map(Timestamp::from_datetime),
                failed_at: row.failed_at.map(Timestamp::from_datetime),
                refunded_at: row.refunded_at.map(Timestamp::from_datetime),
            },
            annotation: PaymentAnnotation::decode(row.meta.as_ref()),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
            version: row.version,
        })
    }
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::database(format!("Invalid {} value in payments row: {}", column, err))
}

fn at(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

fn map_write_error(e: sqlx::Error, action: &str) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.constraint() == Some(EXTERNAL_ID_CONSTRAINT) {
            return DomainError::new(
                ErrorCode::DuplicateExternalId,
                "external_id is already used by another payment",
            );
        }
    }
    DomainError::database(format!("Failed to {} payment: {}", action, e))
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, tenant_id, number, student_bill_id, billing_id, billing_kind_id,
                amount, currency, status, method, provider, external_id,
                gateway_reference, checkout_token, checkout_url,
                payment_type, bank, va_number, store, payment_code,
                manual_channel, manual_reference, recorded_by, verified_by, verified_at,
                requested_at, expires_at, paid_at, canceled_at, failed_at, refunded_at,
                meta, created_at, updated_at, deleted_at, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34,
                $35, $36
            )
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.tenant_id.as_uuid())
        .bind(payment.number)
        .bind(payment.target.student_bill_id().map(|id| *id.as_uuid()))
        .bind(payment.target.billing_id().map(|id| *id.as_uuid()))
        .bind(payment.target.billing_kind_id().map(|id| *id.as_uuid()))
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.method.as_str())
        .bind(payment.provider.map(|p| p.as_str()))
        .bind(&payment.external_id)
        .bind(&payment.gateway_reference)
        .bind(&payment.checkout_token)
        .bind(&payment.checkout_url)
        .bind(&payment.instrument.payment_type)
        .bind(&payment.instrument.bank)
        .bind(&payment.instrument.va_number)
        .bind(&payment.instrument.store)
        .bind(&payment.instrument.payment_code)
        .bind(&payment.manual.channel)
        .bind(&payment.manual.reference)
        .bind(payment.manual.recorded_by.map(|id| *id.as_uuid()))
        .bind(payment.manual.verified_by.map(|id| *id.as_uuid()))
        .bind(at(payment.manual.verified_at))
        .bind(payment.timestamps.requested_at.as_datetime())
        .bind(at(payment.timestamps.expires_at))
        .bind(at(payment.timestamps.paid_at))
        .bind(at(payment.timestamps.canceled_at))
        .bind(at(payment.timestamps.failed_at))
        .bind(at(payment.timestamps.refunded_at))
        .bind(payment.annotation.to_json())
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .bind(at(payment.deleted_at))
        .bind(payment.version)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "save"))?;

        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                amount = $3,
                status = $4,
                gateway_reference = $5,
                checkout_token = $6,
                checkout_url = $7,
                payment_type = $8,
                bank = $9,
                va_number = $10,
                store = $11,
                payment_code = $12,
                manual_channel = $13,
                manual_reference = $14,
                verified_by = $15,
                verified_at = $16,
                expires_at = $17,
                paid_at = $18,
                canceled_at = $19,
                failed_at = $20,
                refunded_at = $21,
                meta = $22,
                updated_at = $23,
                deleted_at = $24,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.version)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.gateway_reference)
        .bind(&payment.checkout_token)
        .bind(&payment.checkout_url)
        .bind(&payment.instrument.payment_type)
        .bind(&payment.instrument.bank)
        .bind(&payment.instrument.va_number)
        .bind(&payment.instrument.store)
        .bind(&payment.instrument.payment_code)
        .bind(&payment.manual.channel)
        .bind(&payment.manual.reference)
        .bind(payment.manual.verified_by.map(|id| *id.as_uuid()))
        .bind(at(payment.manual.verified_at))
        .bind(at(payment.timestamps.expires_at))
        .bind(at(payment.timestamps.paid_at))
        .bind(at(payment.timestamps.canceled_at))
        .bind(at(payment.timestamps.failed_at))
        .bind(at(payment.timestamps.refunded_at))
        .bind(payment.annotation.to_json())
        .bind(payment.updated_at.as_datetime())
        .bind(at(payment.deleted_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "update"))?;

        if result.rows_affected() == 0 {
            let exists: Option<(i32,)> = sqlx::query_as("SELECT version FROM payments WHERE id = $1")
                .bind(payment.id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to check payment: {}", e)))?;

            return Err(match exists {
                Some((current,)) => DomainError::new(
                    ErrorCode::ConcurrencyConflict,
                    format!(
                        "payment {} is at version {}, update was based on {}",
                        payment.id, current, payment.version
                    ),
                ),
                None => DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("payment {} not found", payment.id),
                ),
            });
        }

        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &PaymentId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "{} WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find payment: {}", e)))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "{} WHERE provider = $1 AND external_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to find payment by external id: {}", e))
            })?;

        row.map(Payment::try_from).transpose()
    }

    async fn next_number(&self, tenant_id: &TenantId) -> Result<i64, DomainError> {
        let (number,): (i64,) = sqlx::query_as(NEXT_NUMBER_SQL)
            .bind(tenant_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to allocate payment number: {}", e)))?;

        Ok(number)
    }
}
