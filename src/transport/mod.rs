//! HTTP transport layer for the EVNEX client.
//!
//! Provides the transport abstraction used by both the API request pipeline
//! and the identity-provider exchange, plus the process-wide reqwest client
//! every transport instance shares.

mod http;

pub use http::{
    shared_client, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
};

use std::time::Duration;

/// Transport error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// Request could not be built (bad URL, invalid header).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// Response body could not be read.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}
