//! Observability for the EVNEX client.
//!
//! Logging goes through `tracing`; this module adds subscriber setup,
//! redaction helpers for anything credential-shaped, and request counters.

mod logging;
mod metrics;

pub use logging::{redact_token, redact_url, LogFormat, LoggingConfig, Redacted};
pub use metrics::{DefaultMetricsCollector, MetricsCollector, RequestMetrics};
