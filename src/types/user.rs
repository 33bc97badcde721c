//! Current user payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `GET /v2/apps/user` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(Value);

/// An organisation membership listed on the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganisationRef {
    /// Organisation id.
    pub id: String,
    /// Display name, if present.
    pub name: Option<String>,
    /// Whether this is the user's default organisation.
    pub is_default: bool,
}

impl User {
    /// User id.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Email address.
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// Organisation memberships; entries without an id are skipped.
    pub fn organisations(&self) -> Vec<OrganisationRef> {
        self.0
            .get("organisations")
            .and_then(Value::as_array)
            .map(|orgs| {
                orgs.iter()
                    .filter_map(|org| {
                        Some(OrganisationRef {
                            id: org.get("id")?.as_str()?.to_string(),
                            name: org.get("name").and_then(Value::as_str).map(str::to_string),
                            is_default: org
                                .get("isDefault")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Id of the first organisation flagged `isDefault`.
    pub fn default_organisation_id(&self) -> Option<String> {
        self.organisations()
            .into_iter()
            .find(|org| org.is_default)
            .map(|org| org.id)
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

impl From<Value> for User {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
