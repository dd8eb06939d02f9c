//! Gateway event ledger domain.
//!
//! Append-only audit record of every inbound gateway delivery, matched or not.

mod event;
mod status;

pub use event::{GatewayEvent, RawDelivery};
pub use status::GatewayEventStatus;
