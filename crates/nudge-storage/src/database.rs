// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection setup: PRAGMAs, WAL mode, embedded migrations.
//!
//! All statements run on tokio-rusqlite's single background thread.

use std::path::Path;

use nudge_core::NudgeError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Handle to an open, migrated database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date.
    pub async fn open(path: &str) -> Result<Self, NudgeError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(NudgeError::storage)?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| NudgeError::Storage {
                source: format!("failed to open {path}: {e}").into(),
            })?;
        let db = Self { conn };
        db.prepare(true).await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// A private in-memory database, for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, NudgeError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| NudgeError::Storage {
                source: format!("failed to open in-memory database: {e}").into(),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    async fn prepare(&self, wal: bool) -> Result<(), NudgeError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "busy_timeout", 5000)?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        let report = self
            .conn
            .call(|conn| embedded::migrations::runner().run(conn))
            .await
            .map_err(map_tr_err)?;
        for migration in report.applied_migrations() {
            debug!(migration = %migration, "applied migration");
        }
        Ok(())
    }
}

/// Convert a tokio-rusqlite failure into a storage error.
pub(crate) fn map_tr_err<E: std::fmt::Display>(err: tokio_rusqlite::Error<E>) -> NudgeError {
    NudgeError::Storage {
        source: err.to_string().into(),
    }
}
