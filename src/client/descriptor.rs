//! Request descriptors: what an API operation asks the pipeline to send.

use serde::Serialize;

use crate::errors::EvnexResult;
use crate::transport::HttpMethod;

/// Method, path and optional JSON body of one API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Operation name, used in logs and metrics.
    pub operation: &'static str,
    /// HTTP method.
    pub method: HttpMethod,
    /// Relative path, or an absolute `http(s)://` URL used verbatim.
    pub path: String,
    /// Serialized JSON body.
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// A GET with no body.
    pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    /// A POST carrying `body` as JSON.
    pub fn post<B: Serialize>(
        operation: &'static str,
        path: impl Into<String>,
        body: &B,
    ) -> EvnexResult<Self> {
        Ok(Self {
            operation,
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(serde_json::to_string(body)?),
        })
    }

    /// A PUT carrying `body` as JSON.
    pub fn put<B: Serialize>(
        operation: &'static str,
        path: impl Into<String>,
        body: &B,
    ) -> EvnexResult<Self> {
        Ok(Self {
            operation,
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(serde_json::to_string(body)?),
        })
    }
}
