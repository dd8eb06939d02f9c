//! Payment HTTP adapter.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    CreatePaymentRequest, ErrorResponse, GatewayEventResponse, PatchPaymentRequest,
    PaymentCommandResponse, PaymentResponse, WebhookResponse,
};
pub use handlers::{PaymentApiError, PaymentAppState, TenantContext, TENANT_HEADER, USER_HEADER};
pub use routes::{app_router, payment_router, payment_routes, webhook_routes};
