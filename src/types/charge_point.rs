//! Charge point payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::text_field;

/// The `GET /v2/apps/organisations/{orgId}/charge-points` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargePointList(Value);

impl ChargePointList {
    /// The listed charge points.
    pub fn items(&self) -> Vec<ChargePoint> {
        self.0
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().cloned().map(ChargePoint::from).collect())
            .unwrap_or_default()
    }

    /// The first listed charge point.
    pub fn first(&self) -> Option<ChargePoint> {
        self.0
            .get("items")
            .and_then(|items| items.get(0))
            .cloned()
            .map(ChargePoint::from)
    }

    /// Raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ChargePointList {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A charge point, either a list entry or the detail payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargePoint(Value);

/// The status fields of one connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStatus {
    /// Connector id as sent by the API.
    pub connector_id: Option<String>,
    /// Evnex status, e.g. `CHARGING`.
    pub status: Option<String>,
    /// OCPP error code, e.g. `NoError`.
    pub ocpp_code: Option<String>,
    /// OCPP status, e.g. `AVAILABLE`.
    pub ocpp_status: Option<String>,
}

impl ChargePoint {
    /// Charge point id.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Display name.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Network status, e.g. `ONLINE`.
    pub fn network_status(&self) -> Option<&str> {
        self.0.get("networkStatus").and_then(Value::as_str)
    }

    /// Id of the location the charge point is installed at.
    pub fn location_id(&self) -> Option<&str> {
        self.0
            .get("location")
            .and_then(|location| location.get("id"))
            .and_then(Value::as_str)
    }

    /// Status fields of every connector.
    pub fn connectors(&self) -> Vec<ConnectorStatus> {
        self.0
            .get("connectors")
            .and_then(Value::as_array)
            .map(|connectors| {
                connectors
                    .iter()
                    .map(|c| ConnectorStatus {
                        connector_id: text_field(c, "connectorId"),
                        status: text_field(c, "status"),
                        ocpp_code: text_field(c, "ocppCode"),
                        ocpp_status: text_field(c, "ocppStatus"),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Numeric id of the first connector, as used by remote commands.
    pub fn first_connector_id(&self) -> Option<u32> {
        self.connectors()
            .into_iter()
            .find_map(|c| c.connector_id?.parse().ok())
    }

    /// Raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the view, returning the raw payload.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ChargePoint {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl ConnectorStatus {
    /// `(field, value)` pairs in publishing order: `status`, `ocppCode`, `ocppStatus`.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("status", self.status.as_deref()),
            ("ocppCode", self.ocpp_code.as_deref()),
            ("ocppStatus", self.ocpp_status.as_deref()),
        ]
    }
}
