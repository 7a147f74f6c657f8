// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::TimeDelta;
use nudge_config::model::FollowupConfig;

/// Redelivery policy for follow-ups whose delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    /// Failed attempts after which an entry is dropped.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles with each further failure.
    pub base: TimeDelta,
    /// Upper bound on any single delay.
    pub max: TimeDelta,
}

impl RetrySchedule {
    /// Build from the `[followup]` section. Out-of-range seconds saturate.
    pub fn from_config(config: &FollowupConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base: secs(config.retry_base_secs),
            max: secs(config.retry_max_secs),
        }
    }

    /// Delay before redelivery after `attempts` failures: `base * 2^(attempts-1)`, capped.
    pub fn backoff(&self, attempts: u32) -> TimeDelta {
        let shift = attempts.saturating_sub(1).min(30);
        self.base
            .checked_mul(1i32 << shift)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_config(&FollowupConfig::default())
    }
}

fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
