// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging channel for deterministic testing.
//!
//! `MockChannel` captures every successful send for assertions and can be told
//! to fail the next N deliveries, or all of them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use nudge_core::{AdapterType, MessagingChannel, NudgeError, PluginAdapter, SenderId};

/// One message handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: SenderId,
    pub text: String,
}

pub struct MockChannel {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_next: AtomicU32,
    fail_all: AtomicBool,
    failures: AtomicU32,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_next: AtomicU32::new(0),
            fail_all: AtomicBool::new(false),
            failures: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` deliveries.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every delivery until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Successful sends, in order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Successful sends to one recipient, in order.
    pub async fn sent_to(&self, recipient: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.recipient.as_str() == recipient)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Deliveries that were refused.
    pub fn failed_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }
}

#[async_trait]
impl MessagingChannel for MockChannel {
    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), NudgeError> {
        if self.should_fail() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(NudgeError::Delivery {
                recipient: recipient.to_string(),
                message: "mock channel refused delivery".to_string(),
            });
        }
        self.sent.lock().await.push(SentMessage {
            recipient: recipient.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_sends() {
        let channel = MockChannel::new();
        channel.deliver(&"alice".into(), "hello").await.unwrap();
        channel.deliver(&"bob".into(), "hey").await.unwrap();
        assert_eq!(channel.sent_count().await, 2);
        assert_eq!(channel.sent_to("alice").await, vec!["hello"]);
    }

    #[tokio::test]
    async fn fail_next_counts_down() {
        let channel = MockChannel::new();
        channel.fail_next(2);
        assert!(channel.deliver(&"alice".into(), "1").await.is_err());
        assert!(channel.deliver(&"alice".into(), "2").await.is_err());
        assert!(channel.deliver(&"alice".into(), "3").await.is_ok());
        assert_eq!(channel.failed_count(), 2);
        assert_eq!(channel.sent_to("alice").await, vec!["3"]);
    }

    #[tokio::test]
    async fn failing_switch() {
        let channel = MockChannel::new();
        channel.set_failing(true);
        assert!(channel.deliver(&"alice".into(), "x").await.is_err());
        channel.set_failing(false);
        assert!(channel.deliver(&"alice".into(), "y").await.is_ok());
    }
}
