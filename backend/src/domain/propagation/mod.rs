//! Side-effect propagation rules.
//!
//! Pure decisions about what a payment status means for dependent billing
//! records and enrollments. The writes themselves go through ports.

mod billing;
mod enrollment;
mod merge;

pub use billing::{BillingPaidState, BillingSync};
pub use enrollment::{
    EnrollmentRecord, EnrollmentStatus, EnrollmentUpdate, PaymentLink,
};
pub use merge::deep_merge;
