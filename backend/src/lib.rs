//! Payment Reconciler - payment state machine and gateway webhook reconciliation.
//!
//! Records payment attempts against billing targets, ingests signed gateway
//! notifications through an append-only ledger, and propagates settled
//! status to bills and registration enrollments.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
