//! PostgreSQL adapters - sqlx implementations of the persistence ports.
//!
//! - `PostgresPaymentRepository` - payments with compare-and-swap updates
//! - `PostgresGatewayEventLedger` - delivery ledger with `(provider, external_id)` dedup
//! - `PostgresTargetReader` - read-only view of bills, billings and billing kinds
//! - `PostgresBillingRecordWriter` - paid flag of bills and billings
//! - `PostgresEnrollmentWriter` - registration enrollments

mod billing_record_writer;
mod enrollment_writer;
mod gateway_event_ledger;
mod payment_repository;
mod target_reader;

pub use billing_record_writer::PostgresBillingRecordWriter;
pub use enrollment_writer::PostgresEnrollmentWriter;
pub use gateway_event_ledger::PostgresGatewayEventLedger;
pub use payment_repository::PostgresPaymentRepository;
pub use target_reader::PostgresTargetReader;
