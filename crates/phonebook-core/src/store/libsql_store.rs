//! Durable key-value store backed by a local libSQL file

use std::path::Path;

use libsql::{Builder, Connection, Database};

use super::{migrations, KeyValueStore};
use crate::error::Result;

/// Local libSQL database holding the `kv_store` table
pub struct LibSqlStore {
    _db: Database,
    conn: Connection,
}

impl LibSqlStore {
    /// Open the store at `path`, creating the file and parent directories if needed.
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let store = Self::from_database(db).await?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect()?;
        conn.execute("PRAGMA journal_mode = WAL;", ()).await.ok();
        migrations::run(&conn).await?;
        Ok(Self { _db: db, conn })
    }
}

impl KeyValueStore for LibSqlStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?1", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                libsql::params![key, value, now],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .await?;
        Ok(())
    }
}
