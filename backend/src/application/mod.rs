//! Application layer - Commands, Queries, and Handlers.
//!
//! Orchestrates the payment domain against the ports. Write paths (create,
//! patch, delete, gateway notifications) and read paths are separate handlers.

pub mod handlers;

pub use handlers::payment::{
    CreatePaymentCommand, CreatePaymentHandler, CreatePaymentResult, DeletePaymentCommand,
    DeletePaymentHandler, GetPaymentHandler, GetPaymentQuery, HandleGatewayNotificationCommand,
    HandleGatewayNotificationHandler, HandleGatewayNotificationResult, ListGatewayEventsHandler,
    ListGatewayEventsQuery, PatchPaymentCommand, PatchPaymentHandler, PatchPaymentResult,
    PaymentStatusPropagator, PropagationReport, RowOutcome,
};
