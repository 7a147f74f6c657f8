// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI backend for deterministic testing.
//!
//! Results are popped from a FIFO queue. When the queue is empty the backend
//! answers with a default reply, or keeps failing if built with [`MockBackend::failing`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nudge_core::{AdapterType, AiBackend, AiFailure, PluginAdapter};

pub struct MockBackend {
    script: Arc<Mutex<VecDeque<Result<String, AiFailure>>>>,
    fallback: Result<String, AiFailure>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: AtomicU32,
    delay: Duration,
}

impl MockBackend {
    /// Always answers "mock reply" unless results are queued.
    pub fn new() -> Self {
        Self::with_fallback(Ok("mock reply".to_string()))
    }

    /// Plays back `results` in order, then answers "mock reply".
    pub fn with_results(results: Vec<Result<String, AiFailure>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(results.into())),
            ..Self::new()
        }
    }

    /// Plays back `replies` in order, then answers "mock reply".
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Fails every call as unavailable.
    pub fn failing() -> Self {
        Self::with_fallback(Err(AiFailure::Unavailable("mock backend down".to_string())))
    }

    fn with_fallback(fallback: Result<String, AiFailure>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue one more result.
    pub async fn push(&self, result: Result<String, AiFailure>) {
        self.script.lock().await.push_back(result);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn complete(&self, prompt: &str) -> Result<String, AiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().await.pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_reply_when_script_empty() {
        let backend = MockBackend::new();
        assert_eq!(backend.complete("hi").await.unwrap(), "mock reply");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn scripted_results_in_order() {
        let backend = MockBackend::with_results(vec![
            Err(AiFailure::RateLimited("429".into())),
            Ok("second".into()),
        ]);
        assert!(backend.complete("a").await.is_err());
        assert_eq!(backend.complete("b").await.unwrap(), "second");
        assert_eq!(backend.prompts().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failing_backend_never_succeeds() {
        let backend = MockBackend::failing();
        for _ in 0..3 {
            assert!(matches!(backend.complete("x").await, Err(AiFailure::Unavailable(_))));
        }
    }
}
