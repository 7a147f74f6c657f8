// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state persistence for the Nudge engagement service.

pub mod database;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use nudge_config::model::{StorageBackend, StorageConfig};
use nudge_core::{ConversationStore, NudgeError};
use tracing::info;

pub use database::Database;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Open the store selected by `[storage] backend`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ConversationStore>, NudgeError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("using in-memory conversation store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(&config.database_path).await?;
            info!(path = %config.database_path, "using SQLite conversation store");
            Ok(Arc::new(store))
        }
    }
}
