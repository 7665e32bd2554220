//! Core metrics definitions.
//!
//! Prometheus naming: `_total` for counters, `_seconds` for durations.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    // Admission
    describe_counter!("vmbix_requests_total", "Connections accepted by the listener");
    describe_counter!(
        "vmbix_requests_rejected_total",
        "Connections closed because the admission queue was full"
    );
    describe_gauge!("vmbix_workers", "Live worker tasks");

    // Dispatch
    describe_counter!(
        "vmbix_dispatch_total",
        "Dispatched commands (by outcome: reply, unsupported, failed)"
    );
    describe_histogram!("vmbix_request_duration_seconds", "Time from claim to reply");

    // Session and caches
    describe_counter!("vmbix_reconnects_total", "Session reconnect attempts (by result)");
    describe_counter!("vmbix_cache_hits_total", "Cache hits (by cache)");
    describe_counter!("vmbix_cache_misses_total", "Cache misses (by cache)");
}

pub fn record_accepted() {
    counter!("vmbix_requests_total").increment(1);
}

pub fn record_rejected() {
    counter!("vmbix_requests_rejected_total").increment(1);
}

pub fn set_workers(count: usize) {
    gauge!("vmbix_workers").set(count as f64);
}

pub fn record_dispatch(outcome: &'static str, duration_secs: f64) {
    counter!("vmbix_dispatch_total", "outcome" => outcome).increment(1);
    histogram!("vmbix_request_duration_seconds").record(duration_secs);
}

pub fn record_reconnect(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("vmbix_reconnects_total", "result" => result).increment(1);
}

pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    if hit {
        counter!("vmbix_cache_hits_total", "cache" => cache).increment(1);
    } else {
        counter!("vmbix_cache_misses_total", "cache" => cache).increment(1);
    }
}
