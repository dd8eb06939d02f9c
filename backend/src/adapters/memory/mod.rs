//! In-memory adapters.
//!
//! Implementations of every persistence port backed by process memory. Used
//! by tests and by local runs without a database.

mod billing_store;
mod enrollment_store;
mod gateway_event_ledger;
mod payment_repository;

pub use billing_store::InMemoryBillingStore;
pub use enrollment_store::InMemoryEnrollmentStore;
pub use gateway_event_ledger::InMemoryGatewayEventLedger;
pub use payment_repository::InMemoryPaymentRepository;
