//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - sqlx persistence for payments, the ledger and billing collaborators
//! - `memory` - in-process persistence for tests and local runs
//! - `midtrans` - checkout-token client and mock gateway
//! - `http` - axum routes and DTOs

pub mod http;
pub mod memory;
pub mod midtrans;
pub mod postgres;
