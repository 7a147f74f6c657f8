// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient mutual exclusion.
//!
//! Events for one contact are processed one at a time; different contacts
//! proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use nudge_core::SenderId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct RecipientLocks {
    inner: Arc<DashMap<SenderId, Arc<Mutex<()>>>>,
}

impl RecipientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sender`'s conversation.
    pub async fn acquire(&self, sender: &SenderId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.inner.entry(sender.clone()).or_default().value());
        lock.lock_owned().await
    }

    /// Forget locks nobody holds or waits on. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_sender_is_serialized() {
        let locks = RecipientLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&SenderId::new("alice")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_senders_do_not_block() {
        let locks = RecipientLocks::new();
        let _alice = locks.acquire(&SenderId::new("alice")).await;
        let bob = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&SenderId::new("bob")),
        )
        .await;
        assert!(bob.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = RecipientLocks::new();
        let held = locks.acquire(&SenderId::new("alice")).await;
        drop(locks.acquire(&SenderId::new("bob")).await);

        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
