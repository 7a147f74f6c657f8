// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy for AI reply generation.

use std::time::Duration;

use nudge_config::model::ResponderConfig;

/// How hard the responder tries before falling back to the placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    /// Deadline for a single backend call.
    pub attempt_timeout: Duration,
    /// Sent instead of an AI reply once the attempts are used up.
    pub placeholder: String,
}

impl RetryPolicy {
    pub fn from_config(config: &ResponderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            placeholder: config.placeholder_reply.clone(),
        }
    }

    /// Wait after the `failures`-th failed attempt.
    ///
    /// `min(initial * multiplier^(failures - 1), max)`; zero failures means no wait.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResponderConfig::default())
    }
}
