// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local [`ConversationStore`]. State is lost on restart.

use async_trait::async_trait;
use dashmap::DashMap;

use nudge_core::{
    AdapterType, ConversationState, ConversationStore, NudgeError, PluginAdapter, SenderId,
};

#[derive(Default)]
pub struct MemoryStore {
    states: DashMap<SenderId, ConversationState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, sender: &SenderId) -> Result<ConversationState, NudgeError> {
        Ok(self
            .states
            .get(sender)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| ConversationState::fresh(sender.clone())))
    }

    async fn put(&self, state: ConversationState) -> Result<(), NudgeError> {
        self.states.insert(state.sender.clone(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_core::TopicTag;

    #[tokio::test]
    async fn get_returns_what_was_put() {
        let store = MemoryStore::new();
        let alice = SenderId::new("alice");
        assert!(store.get(&alice).await.unwrap().history.is_empty());
        assert!(store.is_empty());

        let mut state = ConversationState::fresh(alice.clone());
        state.topic = TopicTag::WorkoutQuestions;
        store.put(state.clone()).await.unwrap();

        assert_eq!(store.get(&alice).await.unwrap(), state);
        assert_eq!(store.len(), 1);
    }
}
