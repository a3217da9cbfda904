//! Quota gate metrics.
//!
//! Counters for quota decisions, fallbacks and abuse detections, plus a
//! latency histogram for resolution.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Quota checks by outcome (`authoritative`, `restricted`, `fallback`).
    pub const QUOTA_CHECKS_TOTAL: &str = "docgate_quota_checks_total";

    /// Resolution latency in seconds.
    pub const RESOLUTION_LATENCY_SECONDS: &str = "docgate_quota_resolution_latency_seconds";

    /// Abusive IP classifications by whether the account was exempt.
    pub const IP_ABUSE_DETECTIONS_TOTAL: &str = "docgate_ip_abuse_detections_total";

    /// Registration events by outcome (`created`, `replayed`).
    pub const REGISTRATIONS_TOTAL: &str = "docgate_registrations_total";
}

/// Record a completed quota check.
pub fn record_quota_check(outcome: &'static str, latency_secs: f64) {
    counter!(names::QUOTA_CHECKS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::RESOLUTION_LATENCY_SECONDS).record(latency_secs);
}

/// Record an abusive-IP classification.
pub fn record_abuse_detection(exempt: bool) {
    let exempt = if exempt { "true" } else { "false" };
    counter!(names::IP_ABUSE_DETECTIONS_TOTAL, "exempt" => exempt).increment(1);
}

/// Record a registration event.
pub fn record_registration(outcome: &'static str) {
    counter!(names::REGISTRATIONS_TOTAL, "outcome" => outcome).increment(1);
}
