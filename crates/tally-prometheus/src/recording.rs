// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_histogram};

/// Register all Tally metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "tally_sequence_issued_total",
        "Sequence numbers issued, by scope kind"
    );
    describe_counter!(
        "tally_dispatch_failures_total",
        "Jobs that could not be pushed after their number was issued"
    );
    describe_counter!(
        "tally_duplicate_numbers_total",
        "Inserts rejected because the number already existed in its scope"
    );
    describe_counter!(
        "tally_jobs_processed_total",
        "Queue jobs handled by the worker, by class and outcome"
    );
    describe_histogram!(
        "tally_store_call_seconds",
        "Latency of bounded store calls in seconds"
    );
}

/// Record an issued sequence number. `scope` is `chat` or `message`.
pub fn record_sequence_issued(scope: &'static str) {
    metrics::counter!("tally_sequence_issued_total", "scope" => scope).increment(1);
}

/// Record a job that could not be dispatched.
pub fn record_dispatch_failure(class: &str) {
    metrics::counter!("tally_dispatch_failures_total", "class" => class.to_string()).increment(1);
}

/// Record a duplicate-number rejection.
pub fn record_duplicate_number(scope: &'static str) {
    metrics::counter!("tally_duplicate_numbers_total", "scope" => scope).increment(1);
}

/// Record a job handled by the worker.
pub fn record_job(class: &str, outcome: &'static str) {
    metrics::counter!(
        "tally_jobs_processed_total",
        "class" => class.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the latency of one store call.
pub fn record_store_call(operation: &'static str, seconds: f64) {
    metrics::histogram!("tally_store_call_seconds", "operation" => operation).record(seconds);
}
