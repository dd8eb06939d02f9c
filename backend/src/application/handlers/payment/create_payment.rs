//! CreatePaymentHandler - Command handler for recording a payment attempt.
//!
//! Gateway payments are saved as `initiated`, then a checkout token is
//! requested and the payment moves to `pending`. Staff may record a
//! non-gateway payment directly as `paid`, which propagates immediately.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::foundation::{
    BillingId, BillingKindId, PaymentId, StudentBillId, TenantId, Timestamp, UserId,
};
use crate::domain::payment::{
    GatewayProvider, ManualDetails, NewPayment, Payment, PaymentAnnotation, PaymentError,
    PaymentMethod, PaymentStatus, PaymentTarget, TargetInfo, SUPPORTED_CURRENCY,
};
use crate::ports::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentRepository, TargetReader};

use super::propagate_payment_status::{PaymentStatusPropagator, PropagationReport};

/// Command to create a payment.
#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub tenant_id: TenantId,
    /// Staff member recording the payment.
    pub actor: Option<UserId>,
    pub student_bill_id: Option<StudentBillId>,
    pub billing_id: Option<BillingId>,
    pub billing_kind_id: Option<BillingKindId>,
    /// Defaults to the target's amount.
    pub amount: Option<i64>,
    /// Defaults to the supported currency.
    pub currency: Option<String>,
    pub method: PaymentMethod,
    pub provider: Option<GatewayProvider>,
    pub external_id: Option<String>,
    /// Only `initiated` or, for non-gateway methods, `paid`.
    pub status: Option<PaymentStatus>,
    pub manual: ManualDetails,
    pub meta: Option<Value>,
}

/// Result of payment creation.
#[derive(Debug, Clone)]
pub struct CreatePaymentResult {
    pub payment: Payment,
    pub checkout: Option<CheckoutSession>,
    pub propagation: Option<PropagationReport>,
}

/// Handler for creating payments.
pub struct CreatePaymentHandler {
    repository: Arc<dyn PaymentRepository>,
    targets: Arc<dyn TargetReader>,
    gateway: Arc<dyn PaymentGateway>,
    propagator: PaymentStatusPropagator,
    checkout_expiry_minutes: i64,
}

impl CreatePaymentHandler {
    pub fn new(
        repository: Arc<dyn PaymentRepository>,
        targets: Arc<dyn TargetReader>,
        gateway: Arc<dyn PaymentGateway>,
        propagator: PaymentStatusPropagator,
        checkout_expiry_minutes: i64,
    ) -> Self {
        Self {
            repository,
            targets,
            gateway,
            propagator,
            checkout_expiry_minutes,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentCommand,
    ) -> Result<CreatePaymentResult, PaymentError> {
        // 1. Validate the request shape
        let target =
            PaymentTarget::from_parts(cmd.student_bill_id, cmd.billing_id, cmd.billing_kind_id)?;
        let currency = validate_currency(cmd.currency.as_deref())?;
        let external_id = self.validate_method(&cmd)?;
        let mark_paid = validate_initial_status(cmd.status, cmd.method)?;

        // 2. Resolve the target within the tenant
        let info = self.resolve_target(&cmd.tenant_id, &target).await?;
        let amount = validate_amount(cmd.amount.or(info.default_amount), cmd.method)?;

        // 3. Allocate the display number and save
        let number = self.repository.next_number(&cmd.tenant_id).await?;
        let now = Timestamp::now();
        let mut manual = cmd.manual;
        if !cmd.method.is_gateway() && manual.recorded_by.is_none() {
            manual.recorded_by = cmd.actor;
        }
        let mut payment = Payment::initiate(
            NewPayment {
                id: PaymentId::new(),
                tenant_id: cmd.tenant_id,
                number,
                target,
                amount,
                currency,
                method: cmd.method,
                provider: cmd.provider,
                external_id,
                manual,
                annotation: PaymentAnnotation::decode(cmd.meta.as_ref()),
            },
            now,
        );
        self.repository.save(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            tenant_id = %payment.tenant_id,
            number = payment.number,
            method = payment.method.as_str(),
            amount = payment.amount,
            "Payment created"
        );

        // 4. Gateway flow: request a checkout token
        if payment.method.is_gateway() {
            let checkout = self.start_checkout(&mut payment, now).await?;
            return Ok(CreatePaymentResult {
                payment,
                checkout: Some(checkout),
                propagation: None,
            });
        }

        // 5. Manual flow: optionally record as paid right away
        let propagation = if mark_paid {
            payment.mark_paid_manually(cmd.actor, now);
            self.repository.update(&payment).await?;
            payment.version += 1;
            Some(self.propagator.propagate(&payment).await)
        } else {
            None
        };

        Ok(CreatePaymentResult {
            payment,
            checkout: None,
            propagation,
        })
    }

    fn validate_method(&self, cmd: &CreatePaymentCommand) -> Result<Option<String>, PaymentError> {
        if !cmd.method.is_gateway() {
            if cmd.provider.is_some() {
                return Err(PaymentError::validation(
                    "provider",
                    "provider is only allowed for gateway payments",
                ));
            }
            return Ok(cmd
                .external_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string));
        }

        match cmd.provider {
            None => {
                return Err(PaymentError::validation(
                    "provider",
                    "provider is required for gateway payments",
                ))
            }
            Some(provider) if provider != self.gateway.provider() => {
                return Err(PaymentError::validation(
                    "provider",
                    format!("provider {} is not configured", provider),
                ))
            }
            Some(_) => {}
        }

        if !cmd.manual.is_empty() {
            return Err(PaymentError::validation(
                "manual",
                "manual fields are only allowed for non-gateway payments",
            ));
        }

        cmd.external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| {
                PaymentError::validation("external_id", "external_id is required for gateway payments")
            })
    }

    async fn resolve_target(
        &self,
        tenant_id: &TenantId,
        target: &PaymentTarget,
    ) -> Result<TargetInfo, PaymentError> {
        let target_id = match target {
            PaymentTarget::StudentBill(id) => id.to_string(),
            PaymentTarget::Billing(id) => id.to_string(),
            PaymentTarget::BillingKind(id) => id.to_string(),
        };

        let info = self
            .targets
            .resolve(target)
            .await?
            .filter(|info| &info.tenant_id == tenant_id)
            .ok_or_else(|| PaymentError::target_not_found(target.kind(), &target_id))?;

        if !info.active {
            return Err(PaymentError::TargetInactive { id: target_id });
        }
        Ok(info)
    }

    async fn start_checkout(
        &self,
        payment: &mut Payment,
        now: Timestamp,
    ) -> Result<CheckoutSession, PaymentError> {
        let order_id = payment.external_id.clone().unwrap_or_default();
        let request = CheckoutRequest {
            order_id: order_id.clone(),
            gross_amount: payment.amount,
            currency: payment.currency.clone(),
            expiry_minutes: self.checkout_expiry_minutes,
            item_label: format!("Payment #{}", payment.number),
        };

        let checkout = self.gateway.create_checkout(request).await.map_err(|e| {
            tracing::warn!(
                payment_id = %payment.id,
                order_id = %order_id,
                error = %e,
                "Checkout request failed, payment left initiated"
            );
            PaymentError::from(e)
        })?;

        payment.begin_checkout(
            checkout.token.clone(),
            checkout.redirect_url.clone(),
            Some(now.plus_minutes(self.checkout_expiry_minutes)),
            Timestamp::now(),
        )?;
        self.repository.update(payment).await?;
        payment.version += 1;

        tracing::info!(payment_id = %payment.id, order_id = %order_id, "Checkout started");
        Ok(checkout)
    }
}

fn validate_currency(currency: Option<&str>) -> Result<String, PaymentError> {
    let currency = currency
        .map(|c| c.trim().to_ascii_uppercase())
        .unwrap_or_else(|| SUPPORTED_CURRENCY.to_string());
    if currency != SUPPORTED_CURRENCY {
        return Err(PaymentError::validation(
            "currency",
            format!("only {} is supported", SUPPORTED_CURRENCY),
        ));
    }
    Ok(currency)
}

fn validate_initial_status(
    status: Option<PaymentStatus>,
    method: PaymentMethod,
) -> Result<bool, PaymentError> {
    match status {
        None | Some(PaymentStatus::Initiated) => Ok(false),
        Some(PaymentStatus::Paid) if !method.is_gateway() => Ok(true),
        Some(PaymentStatus::Paid) => Err(PaymentError::validation(
            "status",
            "gateway payments are settled by the gateway",
        )),
        Some(other) => Err(PaymentError::validation(
            "status",
            format!("payments cannot be created as {}", other),
        )),
    }
}

fn validate_amount(amount: Option<i64>, method: PaymentMethod) -> Result<i64, PaymentError> {
    let amount =
        amount.ok_or_else(|| PaymentError::validation("amount", "amount is required"))?;
    if amount < 0 {
        return Err(PaymentError::validation("amount", "amount cannot be negative"));
    }
    if method.is_gateway() && amount == 0 {
        return Err(PaymentError::validation(
            "amount",
            "amount must be positive for gateway payments",
        ));
    }
    Ok(amount)
}
