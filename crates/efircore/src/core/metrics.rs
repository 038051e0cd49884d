//! Prometheus metrics for the live-detection engine.
//!
//! Counters are registered in the default registry at first touch;
//! `init_metrics()` forces registration at startup so the scrape endpoint
//! never shows a partial set.

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec};

/// API key rotations (quota/credential rejections that advanced the cursor)
pub static API_KEY_ROTATIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "efirka_api_key_rotations_total",
        "Number of times the YouTube API key cursor advanced on a quota rejection"
    )
    .unwrap()
});

/// Data API call outcomes
/// Labels: outcome (success/unavailable/hard_error)
pub static API_CALLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "efirka_api_calls_total",
        "YouTube Data API calls by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Completed polling sweeps
pub static POLL_SWEEPS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "efirka_poll_sweeps_total",
        "Number of completed polling sweeps over all tracked channels"
    )
    .unwrap()
});

/// Live notifications emitted (one per recipient)
pub static LIVE_NOTIFICATIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "efirka_live_notifications_total",
        "Live-broadcast notifications emitted to recipients"
    )
    .unwrap()
});

/// Per-recipient delivery failures (swallowed, logged, never retried)
pub static DELIVERY_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "efirka_delivery_failures_total",
        "Notification deliveries that failed at the transport"
    )
    .unwrap()
});

/// Force registration of all metrics.
pub fn init_metrics() {
    Lazy::force(&API_KEY_ROTATIONS_TOTAL);
    Lazy::force(&API_CALLS_TOTAL);
    Lazy::force(&POLL_SWEEPS_TOTAL);
    Lazy::force(&LIVE_NOTIFICATIONS_TOTAL);
    Lazy::force(&DELIVERY_FAILURES_TOTAL);
}
