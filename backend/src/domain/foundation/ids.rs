//! Strongly-typed identifier value objects.
//!
//! Every identifier in this crate is a UUID underneath; the newtypes keep a
//! bill id from being passed where an enrollment id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of one payment attempt.
    PaymentId
);

uuid_id!(
    /// Identifier of one gateway ledger entry.
    GatewayEventId
);

uuid_id!(
    /// Identifier of the tenant (school, organisation) owning a record.
    TenantId
);

uuid_id!(
    /// Identifier of an acting user (operator, payer).
    UserId
);

uuid_id!(
    /// Identifier of a student bill.
    StudentBillId
);

uuid_id!(
    /// Identifier of a general billing record.
    BillingId
);

uuid_id!(
    /// Identifier of a billing kind (campaign).
    BillingKindId
);

uuid_id!(
    /// Identifier of an enrollment (registration) record.
    EnrollmentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(PaymentId::new(), PaymentId::new());
    }

    #[test]
    fn id_round_trips_through_string() {
        let id = EnrollmentId::new();
        let parsed: EnrollmentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_string_fails_to_parse() {
        assert!("not-a-uuid".parse::<TenantId>().is_err());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = BillingId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
