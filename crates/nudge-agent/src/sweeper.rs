// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer-driven dispatch of due follow-ups.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge_core::DeliveryStatus;
use nudge_followup::RequeueOutcome;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::{Engine, report_dropped};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub dispatched: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub failed: usize,
}

pub struct Sweeper {
    engine: Arc<Engine>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Dispatch everything due at `now`, in send-time order.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let followups = Arc::clone(self.engine.followups());
        let mut report = SweepReport::default();

        for entry in followups.due_entries(now) {
            report.dispatched += 1;
            let retry = entry.clone();
            match self.engine.handle_followup(entry, now).await {
                Ok(DeliveryStatus::Delivered | DeliveryStatus::Redelivered) => report.delivered += 1,
                Ok(DeliveryStatus::Requeued) => report.requeued += 1,
                Ok(DeliveryStatus::Failed) => report.failed += 1,
                Ok(DeliveryStatus::NotApplicable) => {}
                Err(e) => {
                    error!(recipient = %retry.recipient, error = %e, "follow-up dispatch failed");
                    match followups.requeue_with_backoff(retry, now) {
                        RequeueOutcome::Requeued { .. } => report.requeued += 1,
                        RequeueOutcome::Exhausted(entry) => {
                            report_dropped(&entry);
                            report.failed += 1;
                        }
                        RequeueOutcome::Superseded => {}
                    }
                }
            }
        }

        if report.dispatched > 0 {
            info!(
                dispatched = report.dispatched,
                delivered = report.delivered,
                requeued = report.requeued,
                failed = report.failed,
                "follow-up sweep complete"
            );
        }
        report
    }

    /// Sweep on every tick until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "follow-up sweeper running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now()).await;
                    let pruned = self.engine.locks().prune();
                    if pruned > 0 {
                        debug!(pruned, "idle recipient locks pruned");
                    }
                }
            }
        }
        info!("follow-up sweeper stopped");
    }
}
