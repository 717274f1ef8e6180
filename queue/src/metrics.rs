//! Business metrics for the queue engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `queue_entries_total` - Total queue entries (fresh sessions only)
//! - `queue_releases_total` - Total sessions released to the purchase flow
//! - `queue_tokens_consumed_total{status}` - Admission token consumption
//!   attempts by outcome (ok, consumed, expired, invalid)
//! - `queue_slots_reclaimed_total` - Expired admission slots reclaimed
//!
//! ## Gauges
//! - `queue_waiting_sessions` - Sessions currently waiting or releasing
//! - `queue_admitted_sessions` - Sessions currently holding admission slots

use metrics::{describe_counter, describe_gauge};

/// Initialize and register all queue metric descriptions.
///
/// This should be called once at application startup, before any metrics
/// are recorded.
pub fn register_queue_metrics() {
    describe_counter!(
        "queue_entries_total",
        "Total number of fresh queue sessions created"
    );
    describe_counter!(
        "queue_releases_total",
        "Total number of sessions released to the purchase flow"
    );
    describe_counter!(
        "queue_tokens_consumed_total",
        "Admission token consumption attempts by outcome (ok, consumed, expired, invalid)"
    );
    describe_counter!(
        "queue_slots_reclaimed_total",
        "Expired admission slot leases reclaimed"
    );
    describe_gauge!(
        "queue_waiting_sessions",
        "Sessions currently waiting or releasing"
    );
    describe_gauge!(
        "queue_admitted_sessions",
        "Sessions currently holding admission slots"
    );

    tracing::info!("Queue metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a fresh queue entry.
pub fn record_queue_entered() {
    metrics::counter!("queue_entries_total").increment(1);
    metrics::gauge!("queue_waiting_sessions").increment(1.0);
}

/// Record a session released to the purchase flow.
pub fn record_session_released() {
    metrics::counter!("queue_releases_total").increment(1);
    metrics::gauge!("queue_waiting_sessions").decrement(1.0);
    metrics::gauge!("queue_admitted_sessions").increment(1.0);
}

/// Record a token consumption attempt.
pub fn record_token_consumed(status: &'static str) {
    metrics::counter!("queue_tokens_consumed_total", "status" => status).increment(1);
}

/// Record reclaimed slot leases.
pub fn record_slots_reclaimed(count: u32) {
    if count > 0 {
        metrics::counter!("queue_slots_reclaimed_total").increment(u64::from(count));
        metrics::gauge!("queue_admitted_sessions").decrement(f64::from(count));
    }
}

/// Record a completed checkout freeing its slot.
pub fn record_checkout_completed() {
    metrics::gauge!("queue_admitted_sessions").decrement(1.0);
}
