//! Request bodies and results of remote commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiResponse;

/// Seconds in the schedule's repeating day.
pub const SCHEDULE_DURATION_SECS: u32 = 86_400;

/// Body of `remote-stop-transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTransactionRequest {
    /// Connector whose transaction is stopped.
    pub connector_id: u32,
}

/// One period of a charging profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargingProfilePeriod {
    /// Start of the period, in seconds since midnight.
    pub start: u32,
    /// Current limit in amps.
    pub limit: u32,
}

/// Body of `PUT /v2/apps/charge-points/{id}/charge-schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeSchedule {
    /// Profile periods, in order of start time.
    pub charging_profile_periods: Vec<ChargingProfilePeriod>,
    /// Length of the repeating schedule, always one day.
    pub duration: u32,
    /// Whether the schedule is active.
    pub enabled: bool,
    /// Limit units, always amps.
    pub units: String,
}

impl ChargeSchedule {
    /// Creates a daily schedule from explicit periods.
    pub fn new(enabled: bool, periods: Vec<ChargingProfilePeriod>) -> Self {
        Self {
            charging_profile_periods: periods,
            duration: SCHEDULE_DURATION_SECS,
            enabled,
            units: "A".to_string(),
        }
    }

    /// The two-period schedule the app sets: a limit from `start_secs`,
    /// another from `stop_secs`.
    pub fn two_period(
        enabled: bool,
        start_secs: u32,
        start_limit: u32,
        stop_secs: u32,
        stop_limit: u32,
    ) -> Self {
        Self::new(
            enabled,
            vec![
                ChargingProfilePeriod {
                    start: start_secs,
                    limit: start_limit,
                },
                ChargingProfilePeriod {
                    start: stop_secs,
                    limit: stop_limit,
                },
            ],
        )
    }
}

/// Result of a remote command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    /// `response.status`, e.g. `Accepted`.
    pub status: Option<String>,
    /// Payload, if the command returned one.
    pub data: Option<Value>,
}

impl CommandOutcome {
    /// Returns true if the command was accepted, or did not report a status.
    pub fn is_accepted(&self) -> bool {
        self.status
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("accepted"))
    }
}

impl From<ApiResponse> for CommandOutcome {
    fn from(response: ApiResponse) -> Self {
        Self {
            status: response.status().map(str::to_string),
            data: response.data,
        }
    }
}
