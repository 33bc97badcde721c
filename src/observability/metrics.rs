//! In-process request metrics.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records a completed API call.
    fn record_request(&self, operation: &str, success: bool, duration: Duration);

    /// Records a failure by kind, e.g. `business_error`.
    fn record_error(&self, kind: &str);

    /// Records an identity-provider exchange.
    fn record_login(&self, success: bool);

    /// Returns a snapshot of the current counters.
    fn snapshot(&self) -> RequestMetrics;
}

/// Counter snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMetrics {
    /// Total API calls.
    pub total_requests: u64,
    /// Calls that returned a success outcome.
    pub successful_requests: u64,
    /// Calls that returned a failure outcome.
    pub failed_requests: u64,
    /// Summed latency in milliseconds.
    pub total_latency_ms: u64,
    /// Successful logins.
    pub logins: u64,
    /// Failed logins.
    pub failed_logins: u64,
    /// Calls per operation.
    pub operations: HashMap<String, u64>,
    /// Failures per kind.
    pub errors: HashMap<String, u64>,
}

impl RequestMetrics {
    /// Mean latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }
}

/// Default metrics collector backed by atomics.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_latency_ms: AtomicU64,
    logins: AtomicU64,
    failed_logins: AtomicU64,
    operations: RwLock<HashMap<String, u64>>,
    errors: RwLock<HashMap<String, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, operation: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        *self.operations.write().entry(operation.to_string()).or_insert(0) += 1;
    }

    fn record_error(&self, kind: &str) {
        *self.errors.write().entry(kind.to_string()).or_insert(0) += 1;
    }

    fn record_login(&self, success: bool) {
        if success {
            self.logins.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_logins.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> RequestMetrics {
        RequestMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            operations: self.operations.read().clone(),
            errors: self.errors.read().clone(),
        }
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
