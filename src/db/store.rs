//! Key-value store contract shared by the background host and every surface.
//!
//! Mirrors the extension storage API: `get(keys)` returns whatever subset of
//! the keys exists, `set(items)` writes all items atomically, `remove(keys)`
//! deletes. Values are arbitrary JSON.

use super::{Database, DbError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => StoreError::Database(e),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Fetch every stored key.
    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError>;

    /// Write all items; either every item lands or none does.
    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Store backed by the `storage` table.
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut items = HashMap::with_capacity(keys.len());

        for key in keys {
            let row: Option<(String,)> = sqlx::query_as("SELECT value FROM storage WHERE key = ?")
                .bind(*key)
                .fetch_optional(self.db.pool())
                .await?;

            if let Some((json,)) = row {
                items.insert((*key).to_string(), serde_json::from_str(&json)?);
            }
        }

        Ok(items)
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM storage")
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter()
            .map(|(key, json)| Ok((key, serde_json::from_str(&json)?)))
            .collect()
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.db.pool().begin().await?;

        for (key, value) in &items {
            sqlx::query(
                "INSERT INTO storage (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!("Stored {} key(s)", items.len());
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;

        for key in keys {
            sqlx::query("DELETE FROM storage WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Process-local store. Used by tests and by embedders without a database.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        self.check()?;
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError> {
        self.check()?;
        Ok(self.items.read().await.clone())
    }

    async fn set(&self, new_items: HashMap<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        self.items.write().await.extend(new_items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}
