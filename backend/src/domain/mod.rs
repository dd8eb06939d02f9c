//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `payment` - Payment aggregate, status mapping and notification verification
//! - `gateway_event` - Audit ledger of inbound gateway deliveries
//! - `propagation` - Billing and enrollment sync rules

pub mod foundation;
pub mod gateway_event;
pub mod payment;
pub mod propagation;
