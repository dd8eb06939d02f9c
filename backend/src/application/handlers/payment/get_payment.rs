//! GetPaymentHandler - Query handler for a single payment.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, TenantId};
use crate::domain::payment::{Payment, PaymentError};
use crate::ports::PaymentRepository;

/// Query for one payment, scoped to a tenant.
#[derive(Debug, Clone)]
pub struct GetPaymentQuery {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
}

pub struct GetPaymentHandler {
    repository: Arc<dyn PaymentRepository>,
}

impl GetPaymentHandler {
    pub fn new(repository: Arc<dyn PaymentRepository>) -> Self {
        Self { repository }
    }

    /// Soft-deleted payments and payments of other tenants are `NotFound`.
    pub async fn handle(&self, query: GetPaymentQuery) -> Result<Payment, PaymentError> {
        self.repository
            .find_by_id(&query.tenant_id, &query.payment_id)
            .await?
            .ok_or(PaymentError::NotFound(query.payment_id))
    }
}
