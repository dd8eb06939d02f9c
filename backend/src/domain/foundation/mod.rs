//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and error types
//! that form the vocabulary of the payment reconciliation domain.

mod errors;
mod ids;
mod patch;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    BillingId, BillingKindId, EnrollmentId, GatewayEventId, PaymentId, StudentBillId, TenantId,
    UserId,
};
pub use patch::Patch;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
