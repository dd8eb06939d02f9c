//! Axum router configuration for payment endpoints.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_payment, delete_payment, get_payment, handle_midtrans_webhook, list_gateway_events,
    patch_payment, PaymentAppState,
};

/// Staff-facing payment routes. All require a tenant context.
///
/// # Routes
/// - `POST /` - Record a payment attempt
/// - `GET /:id` - Fetch one payment
/// - `PATCH /:id` - Staff correction
/// - `DELETE /:id` - Soft delete
/// - `GET /:id/gateway-events` - Ledger rows for the payment
pub fn payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_payment))
        .route(
            "/:id",
            get(get_payment).patch(patch_payment).delete(delete_payment),
        )
        .route("/:id/gateway-events", get(list_gateway_events))
}

/// Gateway callbacks. No tenant context; deliveries are signature verified.
///
/// # Routes
/// - `POST /midtrans` - Midtrans HTTP notification
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new().route("/midtrans", post(handle_midtrans_webhook))
}

/// Complete payment router, meant to be nested under `/api`.
///
/// Staff routes run under `request_timeout`. Webhook deliveries do not: once
/// accepted they run to completion.
pub fn payment_router(request_timeout: Duration) -> Router<PaymentAppState> {
    Router::new()
        .nest(
            "/payments",
            payment_routes().layer(TimeoutLayer::new(request_timeout)),
        )
        .nest("/webhooks", webhook_routes())
}

/// Full application: payment routes under `/api`, a health check and
/// request tracing.
pub fn app_router(state: PaymentAppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", payment_router(request_timeout))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
