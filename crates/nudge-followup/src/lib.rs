// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up queue for the Nudge engagement service.
//!
//! Holds at most one pending follow-up per (recipient, topic), hands out due
//! entries in send-time order, and reschedules failed deliveries with backoff
//! until their attempt budget runs out.

pub mod queue;
pub mod schedule;

pub use queue::{DueEntries, FollowupQueue, RequeueOutcome};
pub use schedule::RetrySchedule;
