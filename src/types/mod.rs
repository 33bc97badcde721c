//! Type definitions for the EVNEX API.
//!
//! Payloads are kept as [`serde_json::Value`] and wrapped in thin views
//! that expose only the fields the client and the bridge depend on.

pub mod charge_point;
pub mod commands;
pub mod envelope;
pub mod user;

pub use charge_point::{ChargePoint, ChargePointList, ConnectorStatus};
pub use commands::{ChargeSchedule, ChargingProfilePeriod, CommandOutcome, StopTransactionRequest};
pub use envelope::{ApiResponse, ResponseEnvelope};
pub use user::{OrganisationRef, User};

use serde_json::Value;

/// Reads a field as text whether the API sent a string or a number.
pub(crate) fn text_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
