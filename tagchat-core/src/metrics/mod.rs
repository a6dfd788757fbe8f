//! Metrics for observability
//!
//! Thin helpers over the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library code records unconditionally.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Register descriptions for every metric this crate emits
pub fn init_metrics() {
    // Discovery
    describe_counter!("discovery.items.skipped", "Discovery results skipped as undeliverable or malformed");

    // Admin resolution
    describe_counter!("admin.resolutions.started", "Provenance resolution passes started");
    describe_counter!("admin.resolutions.suppressed", "Resolution triggers ignored because a pass was in flight");
    describe_counter!("admin.resolutions.stale", "Resolution results discarded after being superseded");
    describe_histogram!("admin.resolution.duration_ms", "Provenance resolution pass duration in milliseconds");

    // Gateway
    describe_counter!("gateway.writes.published", "Objects handed to the store by the gateway");
    describe_counter!("gateway.writes.skipped", "Mutations skipped as redundant or empty");

    // Channel registry
    describe_gauge!("channels.observed", "Channels with a registry entry");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a gauge metric
pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) {
        record_histogram(self.name, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
