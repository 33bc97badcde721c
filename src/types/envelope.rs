//! The `{data, error, response}` envelope every endpoint answers with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope.
///
/// A non-null `error` is a business failure even when the HTTP status was
/// a success. JSON `null` and a missing field both deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Payload of a successful call.
    #[serde(default)]
    pub data: Option<Value>,
    /// Business-level error.
    #[serde(default)]
    pub error: Option<Value>,
    /// Auxiliary command response, e.g. `{"status": "Accepted"}`.
    #[serde(default)]
    pub response: Option<Value>,
}

impl ResponseEnvelope {
    /// Returns the business error, if one was reported.
    pub fn business_error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    /// Returns `response.status` as text, if present.
    pub fn response_status(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
    }
}

/// Successful outcome of one API call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    /// The envelope's `data`, untouched.
    pub data: Option<Value>,
    /// The envelope's `response`, untouched.
    pub response: Option<Value>,
}

impl ApiResponse {
    /// Returns `response.status` as text, if present.
    pub fn status(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
    }

    /// Returns the payload, or `None` when the call carried no data.
    pub fn into_data(self) -> Option<Value> {
        self.data
    }
}

impl From<ResponseEnvelope> for ApiResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        Self {
            data: envelope.data,
            response: envelope.response,
        }
    }
}
