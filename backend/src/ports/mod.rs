//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `PaymentRepository` - Payment aggregate storage with optimistic locking
//! - `GatewayEventLedger` - Append-only audit log of gateway deliveries
//! - `TargetReader` - Read-only view of billing targets
//!
//! ## Propagation Ports
//!
//! - `BillingRecordWriter` - Paid flag of bills and billing records
//! - `EnrollmentWriter` - Payment-owned columns of enrollments
//!
//! ## External Service Ports
//!
//! - `PaymentGateway` - Hosted checkout token requests

mod billing_record_writer;
mod enrollment_writer;
mod gateway_event_ledger;
mod payment_gateway;
mod payment_repository;
mod target_reader;

pub use billing_record_writer::BillingRecordWriter;
pub use enrollment_writer::EnrollmentWriter;
pub use gateway_event_ledger::{GatewayEventLedger, LedgerWrite};
pub use payment_gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewayErrorCode, PaymentGateway,
};
pub use payment_repository::PaymentRepository;
pub use target_reader::TargetReader;
