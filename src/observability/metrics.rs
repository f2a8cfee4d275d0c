//! Metrics collection.
//!
//! # Responsibilities
//! - Define reliable session metrics (attempts, retries, drains, faults)
//! - Record through the `metrics` facade; the binary decides the recorder
//!
//! # Metrics
//! - `reliable_requestor_attempts_total` (counter): attempts by variant
//! - `reliable_requestor_retries_total` (counter): handled failures retried
//! - `reliable_requestor_outcomes_total` (counter): by variant, outcome
//! - `reliable_guard_rejections_total` (counter): refused admissions
//! - `reliable_fault_items_total` (counter): by event
//! - `reliable_session_transitions_total` (counter): by operation, outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Without an installed recorder every call is a no-op

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_request_attempt(variant: &'static str) {
    if enabled() {
        counter!("reliable_requestor_attempts_total", "variant" => variant).increment(1);
    }
}

pub fn record_request_retry(variant: &'static str) {
    if enabled() {
        counter!("reliable_requestor_retries_total", "variant" => variant).increment(1);
    }
}

/// `outcome` is one of `reply`, `timeout`, `error`, `aborted`.
pub fn record_request_outcome(variant: &'static str, outcome: &'static str) {
    if enabled() {
        counter!("reliable_requestor_outcomes_total", "variant" => variant, "outcome" => outcome).increment(1);
    }
}

pub fn record_guard_rejected() {
    if enabled() {
        counter!("reliable_guard_rejections_total").increment(1);
    }
}

/// `event` is one of `accepted`, `duplicate`, `sent`, `failed`, `abandoned`.
pub fn record_fault_item(event: &'static str) {
    if enabled() {
        counter!("reliable_fault_items_total", "event" => event).increment(1);
    }
}

pub fn record_session_transition(operation: &'static str, success: bool) {
    if enabled() {
        let outcome = if success { "ok" } else { "error" };
        counter!("reliable_session_transitions_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
    }
}
