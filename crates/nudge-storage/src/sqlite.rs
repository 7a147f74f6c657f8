// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`ConversationStore`].
//!
//! One row per contact; the state is stored as a JSON document.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use nudge_core::{
    AdapterType, ConversationState, ConversationStore, HealthStatus, NudgeError, PluginAdapter,
    SenderId,
};

use crate::database::{Database, map_tr_err};

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub async fn open(path: &str) -> Result<Self, NudgeError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    pub async fn open_in_memory() -> Result<Self, NudgeError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    /// Number of stored conversations.
    pub async fn count(&self) -> Result<usize, NudgeError> {
        let rows = self
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        Ok(usize::try_from(rows).unwrap_or_default())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get(&self, sender: &SenderId) -> Result<ConversationState, NudgeError> {
        let key = sender.as_str().to_string();
        let stored = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT state FROM conversations WHERE sender = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        match stored {
            Some(json) => serde_json::from_str(&json).map_err(NudgeError::storage),
            None => Ok(ConversationState::fresh(sender.clone())),
        }
    }

    async fn put(&self, state: ConversationState) -> Result<(), NudgeError> {
        let json = serde_json::to_string(&state).map_err(NudgeError::storage)?;
        let sender = state.sender.0;
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO conversations (sender, state, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(sender) DO UPDATE SET state = excluded.state,
                                                       updated_at = excluded.updated_at",
                    params![sender, json, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use nudge_core::{Action, DeliveryStatus, EventKind, HistoryEntry, ReplySource, TopicTag};

    fn sample(sender: &str) -> ConversationState {
        let mut state = ConversationState::fresh(SenderId::new(sender));
        state.topic = TopicTag::NutritionHelp;
        state.record(HistoryEntry {
            at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            event_kind: EventKind::Message,
            action: Action::ReplyWithAi {
                prompt: "Topic: Nutrition Help".into(),
            },
            reply: Some("Try oats!".into()),
            reply_source: Some(ReplySource::Ai),
            delivery: DeliveryStatus::Delivered,
        });
        state
    }

    #[tokio::test]
    async fn unknown_sender_gets_fresh_state() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let state = store.get(&SenderId::new("nobody")).await.unwrap();
        assert_eq!(state, ConversationState::fresh(SenderId::new("nobody")));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn put_then_get_and_overwrite() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut state = sample("alice");
        store.put(state.clone()).await.unwrap();
        assert_eq!(store.get(&SenderId::new("alice")).await.unwrap(), state);

        state.ads_only_override = Some(true);
        store.put(state.clone()).await.unwrap();
        assert_eq!(store.get(&SenderId::new("alice")).await.unwrap(), state);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nudge.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path).await.unwrap();
            store.put(sample("bob")).await.unwrap();
            store.shutdown().await.unwrap();
        }

        let store = SqliteStore::open(path).await.unwrap();
        let state = store.get(&SenderId::new("bob")).await.unwrap();
        assert_eq!(state.topic, TopicTag::NutritionHelp);
        assert_eq!(state.history.len(), 1);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
