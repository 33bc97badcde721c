//! Service implementations for the EVNEX API.
//!
//! Each service groups the operations on one resource and sends them
//! through the shared [`RequestPipeline`](crate::client::RequestPipeline).

mod charge_points;
mod locations;
mod organisations;
mod users;

pub use charge_points::ChargePointsService;
pub use locations::LocationsService;
pub use organisations::OrganisationsService;
pub use users::UsersService;

use serde_json::Value;

use crate::errors::{EvnexError, EvnexResult};
use crate::types::ApiResponse;

/// Extracts the payload of a call that must return data.
pub(crate) fn require_data(response: ApiResponse) -> EvnexResult<Value> {
    response.into_data().ok_or(EvnexError::NoData)
}
