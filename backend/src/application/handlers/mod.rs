//! Application handlers.

pub mod payment;
