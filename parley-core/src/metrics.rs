// ABOUTME: Metrics recording helpers for dispatch operations.
// ABOUTME: Thin wrappers over the `metrics` macros so call sites stay one-liners.

use metrics::counter;

pub fn record_session_created() {
    counter!("parley_sessions_created_total").increment(1);
}

pub fn record_assignment() {
    counter!("parley_sessions_assigned_total").increment(1);
}

pub fn record_eviction() {
    counter!("parley_sessions_evicted_total").increment(1);
}

pub fn record_queue_publish(queue: &str) {
    counter!("parley_queue_published_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("parley_errors_total", "kind" => kind).increment(1);
}
