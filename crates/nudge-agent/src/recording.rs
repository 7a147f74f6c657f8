// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_histogram};
use nudge_core::{Action, EventKind};

/// Register all Nudge metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("nudge_events_total", "Inbound events processed, by kind");
    describe_counter!("nudge_actions_total", "Routing decisions, by action");
    describe_counter!(
        "nudge_replies_total",
        "Replies generated, by source (ai, placeholder)"
    );
    describe_counter!(
        "nudge_followups_dropped_total",
        "Follow-ups dropped after exhausting delivery attempts"
    );
    describe_histogram!(
        "nudge_ai_latency_seconds",
        "Latency of individual AI backend attempts in seconds"
    );
}

pub fn record_event(kind: EventKind) {
    metrics::counter!("nudge_events_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_action(action: &Action) {
    metrics::counter!("nudge_actions_total", "action" => action.name()).increment(1);
}

pub fn record_followup_dropped() {
    metrics::counter!("nudge_followups_dropped_total").increment(1);
}
