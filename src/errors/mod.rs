//! Error types for the EVNEX client.
//!
//! Every failure the client can observe is classified into one of a small
//! set of variants: identity-provider failures, transport failures, non-2xx
//! HTTP statuses and business errors reported inside a successful envelope.
//! Nothing is thrown past the public API; operations return [`EvnexResult`].

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for EVNEX operations.
pub type EvnexResult<T> = Result<T, EvnexError>;

/// Error type for EVNEX client operations.
#[derive(Debug, Error)]
pub enum EvnexError {
    /// Configuration error (missing credentials, malformed base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The identity-provider exchange failed.
    ///
    /// No API request is attempted once this is returned.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the identity provider or the login flow.
        message: String,
        /// Identity-provider error code, e.g. `NotAuthorizedException`.
        code: Option<String>,
    },

    /// Connection-level failure (DNS, TLS, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API answered with a non-success status code.
    #[error("HTTP {status} {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Reason phrase.
        reason: String,
        /// Raw response body, if any was returned.
        body: Option<String>,
    },

    /// The envelope's `error` field was populated on a successful status.
    #[error("Business error: {error}")]
    Business {
        /// The `error` value exactly as returned by the API.
        error: serde_json::Value,
    },

    /// The call succeeded but carried no `data` payload.
    #[error("No data returned")]
    NoData,

    /// A body could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

impl EvnexError {
    /// Creates an authentication error without a provider code.
    pub fn authentication(message: impl Into<String>) -> Self {
        EvnexError::Authentication {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        EvnexError::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if the session could not be established.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, EvnexError::Authentication { .. })
    }

    /// Returns true if the failure is likely to clear up on the next poll.
    ///
    /// Transport failures, 5xx statuses and 429 rate limiting qualify.
    ///
    /// Callers are expected to skip the current cycle rather than abort.
    pub fn is_transient(&self) -> bool {
        match self {
            EvnexError::Transport(_) => true,
            EvnexError::Http { status, .. } => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }

    /// Returns the HTTP status if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            EvnexError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EvnexError::Configuration { .. } => "configuration",
            EvnexError::Authentication { .. } => "auth_failed",
            EvnexError::Transport(_) => "transport_error",
            EvnexError::Http { .. } => "http_error",
            EvnexError::Business { .. } => "business_error",
            EvnexError::NoData => "no_data",
            EvnexError::Serialization { .. } => "serialization",
            EvnexError::Cancelled => "cancelled",
        }
    }
}

impl From<serde_json::Error> for EvnexError {
    fn from(err: serde_json::Error) -> Self {
        EvnexError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for EvnexError {
    fn from(err: url::ParseError) -> Self {
        EvnexError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
