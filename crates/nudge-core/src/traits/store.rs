// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait.

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationState, SenderId};

/// Narrow read/write interface to per-contact conversation state.
///
/// The engine serializes access per sender; stores only need to make a single
/// `get` or `put` atomic.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Returns the stored state, or [`ConversationState::fresh`] for an unknown sender.
    async fn get(&self, sender: &SenderId) -> Result<ConversationState, NudgeError>;

    /// Replaces the stored state for `state.sender`.
    async fn put(&self, state: ConversationState) -> Result<(), NudgeError>;
}
