//! The billing object a payment settles.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BillingId, BillingKindId, StudentBillId, TenantId};

use super::errors::PaymentError;

/// Exactly one billing target per payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    StudentBill(StudentBillId),
    Billing(BillingId),
    BillingKind(BillingKindId),
}

impl PaymentTarget {
    /// Builds a target from the three optional references of a request.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when zero or more than one reference is present.
    pub fn from_parts(
        student_bill_id: Option<StudentBillId>,
        billing_id: Option<BillingId>,
        billing_kind_id: Option<BillingKindId>,
    ) -> Result<Self, PaymentError> {
        match (student_bill_id, billing_id, billing_kind_id) {
            (Some(id), None, None) => Ok(PaymentTarget::StudentBill(id)),
            (None, Some(id), None) => Ok(PaymentTarget::Billing(id)),
            (None, None, Some(id)) => Ok(PaymentTarget::BillingKind(id)),
            (None, None, None) => Err(PaymentError::validation(
                "target",
                "one of student_bill_id, billing_id or billing_kind_id is required",
            )),
            _ => Err(PaymentError::validation(
                "target",
                "only one of student_bill_id, billing_id or billing_kind_id may be set",
            )),
        }
    }

    pub fn student_bill_id(&self) -> Option<StudentBillId> {
        match self {
            PaymentTarget::StudentBill(id) => Some(*id),
            _ => None,
        }
    }

    pub fn billing_id(&self) -> Option<BillingId> {
        match self {
            PaymentTarget::Billing(id) => Some(*id),
            _ => None,
        }
    }

    pub fn billing_kind_id(&self) -> Option<BillingKindId> {
        match self {
            PaymentTarget::BillingKind(id) => Some(*id),
            _ => None,
        }
    }

    /// Bills and general billing records carry a paid flag; kinds do not.
    pub fn is_billing_record(&self) -> bool {
        !matches!(self, PaymentTarget::BillingKind(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PaymentTarget::StudentBill(_) => "student_bill",
            PaymentTarget::Billing(_) => "billing",
            PaymentTarget::BillingKind(_) => "billing_kind",
        }
    }
}

/// What the target resolver learned about a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub tenant_id: TenantId,
    /// Amount to charge when the request does not name one.
    pub default_amount: Option<i64>,
    /// Kinds can be switched off; bills are always active.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_reference_builds_target() {
        let id = StudentBillId::new();
        let target = PaymentTarget::from_parts(Some(id), None, None).unwrap();
        assert_eq!(target, PaymentTarget::StudentBill(id));
        assert_eq!(target.student_bill_id(), Some(id));
        assert!(target.is_billing_record());
    }

    #[test]
    fn missing_reference_is_rejected() {
        let result = PaymentTarget::from_parts(None, None, None);
        assert!(matches!(result, Err(PaymentError::ValidationFailed { .. })));
    }

    #[test]
    fn multiple_references_are_rejected() {
        let result =
            PaymentTarget::from_parts(Some(StudentBillId::new()), None, Some(BillingKindId::new()));
        assert!(matches!(result, Err(PaymentError::ValidationFailed { .. })));
    }

    #[test]
    fn kind_target_is_not_a_billing_record() {
        let target = PaymentTarget::BillingKind(BillingKindId::new());
        assert!(!target.is_billing_record());
        assert_eq!(target.kind(), "billing_kind");
    }
}
