//! Payment command and query handlers.

mod create_payment;
mod delete_payment;
mod get_payment;
mod handle_gateway_notification;
mod list_gateway_events;
mod patch_payment;
mod propagate_payment_status;

pub use create_payment::{CreatePaymentCommand, CreatePaymentHandler, CreatePaymentResult};
pub use delete_payment::{DeletePaymentCommand, DeletePaymentHandler};
pub use get_payment::{GetPaymentHandler, GetPaymentQuery};
pub use handle_gateway_notification::{
    HandleGatewayNotificationCommand, HandleGatewayNotificationHandler,
    HandleGatewayNotificationResult, MAX_UPDATE_ATTEMPTS,
};
pub use list_gateway_events::{ListGatewayEventsHandler, ListGatewayEventsQuery};
pub use patch_payment::{PatchPaymentCommand, PatchPaymentHandler, PatchPaymentResult};
pub use propagate_payment_status::{PaymentStatusPropagator, PropagationReport, RowOutcome};
