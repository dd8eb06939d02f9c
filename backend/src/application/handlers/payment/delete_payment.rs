//! DeletePaymentHandler - soft delete.
//!
//! Deleted payments disappear from reads and release their external id for
//! reuse. Dependent billing and enrollment rows are left as they are.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, TenantId, Timestamp, UserId};
use crate::domain::payment::PaymentError;
use crate::ports::PaymentRepository;

#[derive(Debug, Clone)]
pub struct DeletePaymentCommand {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub actor: Option<UserId>,
}

pub struct DeletePaymentHandler {
    repository: Arc<dyn PaymentRepository>,
}

impl DeletePaymentHandler {
    pub fn new(repository: Arc<dyn PaymentRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: DeletePaymentCommand) -> Result<(), PaymentError> {
        let mut payment = self
            .repository
            .find_by_id(&cmd.tenant_id, &cmd.payment_id)
            .await?
            .ok_or(PaymentError::NotFound(cmd.payment_id))?;

        payment.soft_delete(Timestamp::now());
        self.repository.update(&payment).await.map_err(|e| {
            if e.is_conflict() {
                PaymentError::Conflict(payment.id)
            } else {
                PaymentError::from(e)
            }
        })?;

        tracing::info!(
            payment_id = %payment.id,
            tenant_id = %payment.tenant_id,
            actor = ?cmd.actor,
            "Payment deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPaymentRepository;
    use crate::domain::foundation::StudentBillId;
    use crate::domain::payment::{
        GatewayProvider, ManualDetails, NewPayment, Payment, PaymentAnnotation, PaymentMethod,
        PaymentTarget,
    };

    fn gateway_payment(tenant_id: TenantId, external_id: &str) -> Payment {
        Payment::initiate(
            NewPayment {
                id: PaymentId::new(),
                tenant_id,
                number: 1,
                target: PaymentTarget::StudentBill(StudentBillId::new()),
                amount: 10_000,
                currency: "IDR".to_string(),
                method: PaymentMethod::Gateway,
                provider: Some(GatewayProvider::Midtrans),
                external_id: Some(external_id.to_string()),
                manual: ManualDetails::default(),
                annotation: PaymentAnnotation::default(),
            },
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn deleted_payment_is_hidden_and_releases_external_id() {
        let repo = Arc::new(InMemoryPaymentRepository::new());
        let tenant = TenantId::new();
        let payment = gateway_payment(tenant, "INV-1");
        repo.save(&payment).await.unwrap();

        let handler = DeletePaymentHandler::new(repo.clone());
        handler
            .handle(DeletePaymentCommand { tenant_id: tenant, payment_id: payment.id, actor: None })
            .await
            .unwrap();

        assert!(repo.find_by_id(&tenant, &payment.id).await.unwrap().is_none());
        assert!(repo.stored(&payment.id).await.unwrap().deleted_at.is_some());
        assert!(repo.save(&gateway_payment(tenant, "INV-1")).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let repo = Arc::new(InMemoryPaymentRepository::new());
        let tenant = TenantId::new();
        let payment = gateway_payment(tenant, "INV-2");
        repo.save(&payment).await.unwrap();
        let handler = DeletePaymentHandler::new(repo);
        let cmd = DeletePaymentCommand { tenant_id: tenant, payment_id: payment.id, actor: None };

        handler.handle(cmd.clone()).await.unwrap();
        let err = handler.handle(cmd).await.unwrap_err();

        assert_eq!(err, PaymentError::NotFound(payment.id));
    }
}
