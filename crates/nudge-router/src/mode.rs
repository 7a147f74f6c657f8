// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide operating mode.
//!
//! Readers take a lock-free snapshot per event; a flip is visible to every event
//! routed after it and never to one already routed.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use nudge_core::ModeFlag;
use tracing::info;

/// Current mode plus when it was last set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub mode: ModeFlag,
    pub changed_at: DateTime<Utc>,
}

/// Shared handle to the process-wide mode. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    inner: Arc<ArcSwap<ModeState>>,
}

impl ModeSwitch {
    pub fn new(initial: ModeFlag) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ModeState {
                mode: initial,
                changed_at: Utc::now(),
            })),
        }
    }

    /// The mode in effect right now.
    pub fn current(&self) -> ModeFlag {
        self.inner.load().mode
    }

    /// The mode and the time it was set.
    pub fn snapshot(&self) -> ModeState {
        **self.inner.load()
    }

    /// Switch modes. Returns the previous mode.
    ///
    /// Setting the mode already in effect leaves `changed_at` untouched.
    pub fn set(&self, mode: ModeFlag) -> ModeFlag {
        let next = Arc::new(ModeState {
            mode,
            changed_at: Utc::now(),
        });
        let previous = self.inner.rcu(|current| {
            if current.mode == mode {
                Arc::clone(current)
            } else {
                Arc::clone(&next)
            }
        });
        if previous.mode != mode {
            info!(from = %previous.mode, to = %mode, "operating mode changed");
        }
        previous.mode
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new(ModeFlag::default())
    }
}
