//! ListGatewayEventsHandler - ledger rows recorded for a payment.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, TenantId};
use crate::domain::gateway_event::GatewayEvent;
use crate::domain::payment::PaymentError;
use crate::ports::{GatewayEventLedger, PaymentRepository};

#[derive(Debug, Clone)]
pub struct ListGatewayEventsQuery {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
}

pub struct ListGatewayEventsHandler {
    repository: Arc<dyn PaymentRepository>,
    ledger: Arc<dyn GatewayEventLedger>,
}

impl ListGatewayEventsHandler {
    pub fn new(repository: Arc<dyn PaymentRepository>, ledger: Arc<dyn GatewayEventLedger>) -> Self {
        Self { repository, ledger }
    }

    /// Rows oldest first. The payment must be visible to the tenant.
    pub async fn handle(
        &self,
        query: ListGatewayEventsQuery,
    ) -> Result<Vec<GatewayEvent>, PaymentError> {
        self.repository
            .find_by_id(&query.tenant_id, &query.payment_id)
            .await?
            .ok_or(PaymentError::NotFound(query.payment_id))?;

        Ok(self.ledger.list_for_payment(&query.payment_id).await?)
    }
}
