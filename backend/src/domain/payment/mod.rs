//! Payment domain module.
//!
//! Payment lifecycle, gateway status mapping and notification verification.
//!
//! # Module Structure
//!
//! - `aggregate` - Payment aggregate entity
//! - `status` - PaymentStatus state machine, method, provider, currency
//! - `status_mapper` - Provider status to internal status
//! - `target` - Billing target reference
//! - `annotation` - Typed view of the `meta` annotation
//! - `notification` - Gateway notification schema
//! - `signature` - Notification signature verification
//! - `errors` - PaymentError taxonomy

mod aggregate;
mod annotation;
mod errors;
mod notification;
mod signature;
mod status;
mod status_mapper;
mod target;

pub use aggregate::{ManualDetails, NewPayment, Payment, PaymentTimestamps, StatusChange};
pub use annotation::{EnrollmentLinkage, PaymentAnnotation, REGISTRATION_CATEGORY};
pub use errors::PaymentError;
pub use notification::{ChannelSnapshot, GatewayNotification, VirtualAccount};
pub use signature::{compute_signature, SignatureVerifier};
pub use status::{GatewayProvider, PaymentMethod, PaymentStatus, SUPPORTED_CURRENCY};
pub use status_mapper::{
    map_transaction_status, resolve_status, FraudStatus, StampField, StatusMapping,
    TransactionStatus,
};
pub use target::{PaymentTarget, TargetInfo};
