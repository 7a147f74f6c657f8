// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine with mock adapters, a follow-up
//! queue, and an in-memory (or temp SQLite) store. Helpers drive events and
//! sweeps with explicit timestamps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge_agent::{Engine, HandledEvent, SweepReport, Sweeper};
use nudge_config::model::{FollowupConfig, RouterConfig};
use nudge_core::{ConversationState, ConversationStore, InboundEvent, ModeFlag, NudgeError, SenderId};
use nudge_followup::{FollowupQueue, RetrySchedule};
use nudge_responder::{AiResponder, RetryPolicy};
use nudge_router::ModeSwitch;
use nudge_storage::{MemoryStore, SqliteStore};

use crate::mock_backend::MockBackend;
use crate::mock_channel::MockChannel;

/// Placeholder text used by harness-built responders.
pub const TEST_PLACEHOLDER: &str = "Coach will get back to you soon.";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    backend: MockBackend,
    mode: ModeFlag,
    router: RouterConfig,
    followup: FollowupConfig,
    max_attempts: u32,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            backend: MockBackend::new(),
            mode: ModeFlag::Normal,
            router: RouterConfig::default(),
            followup: FollowupConfig::default(),
            max_attempts: 3,
            sqlite: false,
        }
    }

    /// Use this backend instead of the always-answering default.
    pub fn with_backend(mut self, backend: MockBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Queue these AI replies.
    pub fn with_replies(self, replies: Vec<&str>) -> Self {
        self.with_backend(MockBackend::with_replies(replies))
    }

    pub fn with_mode(mut self, mode: ModeFlag) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    pub fn with_followup(mut self, followup: FollowupConfig) -> Self {
        self.followup = followup;
        self
    }

    /// Responder attempts per reply.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Persist conversations in a temp SQLite file instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, NudgeError> {
        let temp_dir = tempfile::TempDir::new().map_err(NudgeError::storage)?;
        let store: Arc<dyn ConversationStore> = if self.sqlite {
            let path = temp_dir.path().join("test.db");
            Arc::new(SqliteStore::open(&path.to_string_lossy()).await?)
        } else {
            Arc::new(MemoryStore::new())
        };

        let backend = Arc::new(self.backend);
        let channel = Arc::new(MockChannel::new());
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(1),
            multiplier: 1.0,
            max_backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
            placeholder: TEST_PLACEHOLDER.to_string(),
        };
        let responder = Arc::new(AiResponder::new(backend.clone(), policy));
        let mode = ModeSwitch::new(self.mode);
        let followups = Arc::new(FollowupQueue::new(RetrySchedule::from_config(&self.followup)));

        let engine = Arc::new(Engine::new(
            &self.router,
            Arc::clone(&store),
            channel.clone(),
            responder,
            mode.clone(),
            Arc::clone(&followups),
        ));

        Ok(TestHarness {
            backend,
            channel,
            store,
            followups,
            mode,
            engine,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters.
pub struct TestHarness {
    pub backend: Arc<MockBackend>,
    pub channel: Arc<MockChannel>,
    pub store: Arc<dyn ConversationStore>,
    pub followups: Arc<FollowupQueue>,
    pub mode: ModeSwitch,
    pub engine: Arc<Engine>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, NudgeError> {
        Self::builder().build().await
    }

    pub async fn message(
        &self,
        sender: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<HandledEvent, NudgeError> {
        self.engine
            .handle_event(InboundEvent::message(sender, text, at))
            .await
    }

    pub async fn ad_click(&self, sender: &str, at: DateTime<Utc>) -> Result<HandledEvent, NudgeError> {
        self.engine
            .handle_event(InboundEvent::ad_click(sender, None, at))
            .await
    }

    /// Run one follow-up sweep as of `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        Sweeper::new(Arc::clone(&self.engine), Duration::from_secs(1))
            .sweep_once(now)
            .await
    }

    pub async fn state(&self, sender: &str) -> Result<ConversationState, NudgeError> {
        self.store.get(&SenderId::new(sender)).await
    }
}
