//! HTTP handlers for payment endpoints.
//!
//! These handlers connect Axum routes to the payment command/query handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::application::{
    CreatePaymentCommand, CreatePaymentHandler, DeletePaymentCommand, DeletePaymentHandler,
    GetPaymentHandler, GetPaymentQuery, HandleGatewayNotificationCommand,
    HandleGatewayNotificationHandler, ListGatewayEventsHandler, ListGatewayEventsQuery,
    PatchPaymentCommand, PatchPaymentHandler, PaymentStatusPropagator,
};
use crate::domain::foundation::{PaymentId, TenantId, UserId};
use crate::domain::gateway_event::RawDelivery;
use crate::domain::payment::{GatewayProvider, ManualDetails, PaymentError, SignatureVerifier};
use crate::ports::{
    BillingRecordWriter, EnrollmentWriter, GatewayEventLedger, PaymentGateway, PaymentRepository,
    TargetReader,
};

use super::dto::{
    CreatePaymentRequest, ErrorResponse, GatewayEventListResponse, GatewayEventResponse,
    PatchPaymentRequest, PaymentCommandResponse, PaymentResponse, WebhookResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the payment routes.
///
/// Cloned per request; handlers are built on demand from the Arc'd ports.
#[derive(Clone)]
pub struct PaymentAppState {
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub gateway_event_ledger: Arc<dyn GatewayEventLedger>,
    pub target_reader: Arc<dyn TargetReader>,
    pub billing_writer: Arc<dyn BillingRecordWriter>,
    pub enrollment_writer: Arc<dyn EnrollmentWriter>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub signature_verifier: SignatureVerifier,
    pub checkout_expiry_minutes: i64,
}

impl PaymentAppState {
    fn propagator(&self) -> PaymentStatusPropagator {
        PaymentStatusPropagator::new(self.billing_writer.clone(), self.enrollment_writer.clone())
    }

    pub fn create_payment_handler(&self) -> CreatePaymentHandler {
        CreatePaymentHandler::new(
            self.payment_repository.clone(),
            self.target_reader.clone(),
            self.payment_gateway.clone(),
            self.propagator(),
            self.checkout_expiry_minutes,
        )
    }

    pub fn patch_payment_handler(&self) -> PatchPaymentHandler {
        PatchPaymentHandler::new(self.payment_repository.clone(), self.propagator())
    }

    pub fn get_payment_handler(&self) -> GetPaymentHandler {
        GetPaymentHandler::new(self.payment_repository.clone())
    }

    pub fn delete_payment_handler(&self) -> DeletePaymentHandler {
        DeletePaymentHandler::new(self.payment_repository.clone())
    }

    pub fn list_gateway_events_handler(&self) -> ListGatewayEventsHandler {
        ListGatewayEventsHandler::new(
            self.payment_repository.clone(),
            self.gateway_event_ledger.clone(),
        )
    }

    pub fn notification_handler(&self) -> HandleGatewayNotificationHandler {
        HandleGatewayNotificationHandler::new(
            self.payment_repository.clone(),
            self.gateway_event_ledger.clone(),
            self.signature_verifier.clone(),
            self.propagator(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Tenant Context (stands in for the auth collaborator)
// ════════════════════════════════════════════════════════════════════════════════

pub const TENANT_HEADER: &str = "X-Tenant-Id";
pub const USER_HEADER: &str = "X-User-Id";

/// Tenant and acting user for a staff request.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
}

/// Rejection when the tenant header is missing or malformed.
pub struct TenantRequired;

impl IntoResponse for TenantRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("TENANT_REQUIRED", "A valid X-Tenant-Id header is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = TenantRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let tenant_id = header_value(parts, TENANT_HEADER)
                .and_then(|s| s.parse::<TenantId>().ok())
                .ok_or(TenantRequired)?;
            let user_id = header_value(parts, USER_HEADER).and_then(|s| s.parse::<UserId>().ok());

            Ok(TenantContext { tenant_id, user_id })
        })
    }
}

fn header_value<'a>(parts: &'a axum::http::request::Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments - Record a payment attempt
pub async fn create_payment(
    State(state): State<PaymentAppState>,
    ctx: TenantContext,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = CreatePaymentCommand {
        tenant_id: ctx.tenant_id,
        actor: ctx.user_id,
        student_bill_id: req.student_bill_id,
        billing_id: req.billing_id,
        billing_kind_id: req.billing_kind_id,
        amount: req.amount,
        currency: req.currency,
        method: req.method,
        provider: req.provider,
        external_id: req.external_id,
        status: req.status,
        manual: ManualDetails {
            channel: req.manual_channel,
            reference: req.manual_reference,
            recorded_by: None,
            verified_by: req.verified_by,
            verified_at: req.verified_at,
        },
        meta: req.meta,
    };

    let result = state.create_payment_handler().handle(cmd).await?;

    let response = PaymentCommandResponse {
        payment: PaymentResponse::from(result.payment),
        checkout: result.checkout.map(Into::into),
        propagation: result.propagation.map(Into::into),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/payments/:id - Fetch one payment
pub async fn get_payment(
    State(state): State<PaymentAppState>,
    ctx: TenantContext,
    Path(payment_id): Path<PaymentId>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payment = state
        .get_payment_handler()
        .handle(GetPaymentQuery {
            tenant_id: ctx.tenant_id,
            payment_id,
        })
        .await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// PATCH /api/payments/:id - Staff correction
pub async fn patch_payment(
    State(state): State<PaymentAppState>,
    ctx: TenantContext,
    Path(payment_id): Path<PaymentId>,
    Json(req): Json<PatchPaymentRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = PatchPaymentCommand {
        tenant_id: ctx.tenant_id,
        payment_id,
        actor: ctx.user_id,
        status: req.status,
        amount: req.amount,
        gateway_reference: req.gateway_reference,
        checkout_url: req.checkout_url,
        manual_channel: req.manual_channel,
        manual_reference: req.manual_reference,
        verified_by: req.verified_by,
        verified_at: req.verified_at,
        expires_at: req.expires_at,
        paid_at: req.paid_at,
        canceled_at: req.canceled_at,
        failed_at: req.failed_at,
        refunded_at: req.refunded_at,
        meta: req.meta,
    };

    let result = state.patch_payment_handler().handle(cmd).await?;

    Ok(Json(PaymentCommandResponse {
        payment: PaymentResponse::from(result.payment),
        checkout: None,
        propagation: result.propagation.map(Into::into),
    }))
}

/// DELETE /api/payments/:id - Soft delete
pub async fn delete_payment(
    State(state): State<PaymentAppState>,
    ctx: TenantContext,
    Path(payment_id): Path<PaymentId>,
) -> Result<impl IntoResponse, PaymentApiError> {
    state
        .delete_payment_handler()
        .handle(DeletePaymentCommand {
            tenant_id: ctx.tenant_id,
            payment_id,
            actor: ctx.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/payments/:id/gateway-events - Ledger rows for a payment
pub async fn list_gateway_events(
    State(state): State<PaymentAppState>,
    ctx: TenantContext,
    Path(payment_id): Path<PaymentId>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let events = state
        .list_gateway_events_handler()
        .handle(ListGatewayEventsQuery {
            tenant_id: ctx.tenant_id,
            payment_id,
        })
        .await?;

    Ok(Json(GatewayEventListResponse {
        events: events.into_iter().map(GatewayEventResponse::from).collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoint (no tenant context, signature verified)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/midtrans - Gateway notification
pub async fn handle_midtrans_webhook(
    State(state): State<PaymentAppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentApiError> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let cmd = HandleGatewayNotificationCommand {
        provider: GatewayProvider::Midtrans,
        delivery: RawDelivery::new(headers, uri.query().map(str::to_string), &body),
    };

    // Detached so a dropped connection cannot cancel a half-applied delivery.
    let handler = state.notification_handler();
    let result = tokio::spawn(async move { handler.handle(cmd).await })
        .await
        .map_err(|e| PaymentError::persistence(format!("notification task failed: {}", e)))??;
    Ok(Json(WebhookResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts payment errors to HTTP responses.
#[derive(Debug)]
pub struct PaymentApiError(pub PaymentError);

impl From<PaymentError> for PaymentApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl PaymentApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            PaymentError::ValidationFailed { .. } | PaymentError::TargetInactive { .. } => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::NotFound(_) | PaymentError::TargetNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PaymentError::Conflict(_) => StatusCode::CONFLICT,
            PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "Payment request failed");
        }

        let message = match &self.0 {
            // Store errors can carry SQL details.
            PaymentError::Persistence(_) => "Internal storage error".to_string(),
            other => other.message(),
        };
        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}
