//! Typed view over the persisted keys.

use super::types::Link;
use crate::db::{Store, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Storage keys, shared with the extension's popup.
pub mod keys {
    pub const LINKS: &str = "links";
    pub const USER_LINKS: &str = "userLinks";
    pub const ADMIN_LINKS: &str = "adminLinks";
    pub const CATEGORIES: &str = "categories";
    pub const INITIALIZED: &str = "initialized";
    pub const LAST_SYNC_TIME: &str = "lastSyncTime";
    pub const LAST_UPDATE: &str = "lastUpdate";
    pub const LAST_API_SUCCESS: &str = "lastApiSuccess";
    pub const USER_ID: &str = "userId";
    pub const SETTINGS: &str = "settings";
}

const STATE_KEYS: [&str; 7] = [
    keys::LINKS,
    keys::USER_LINKS,
    keys::ADMIN_LINKS,
    keys::CATEGORIES,
    keys::INITIALIZED,
    keys::LAST_SYNC_TIME,
    keys::LAST_UPDATE,
];

/// Snapshot of the link collections and sync metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryState {
    pub links: Vec<Link>,
    pub user_links: Vec<Link>,
    pub admin_links: Vec<Link>,
    pub categories: Vec<String>,
    pub initialized: bool,
    pub last_sync_time: Option<String>,
    pub last_update: Option<String>,
}

impl LibraryState {
    pub async fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let items = store.get(&STATE_KEYS).await?;

        Ok(Self {
            links: decode_links(&items, keys::LINKS),
            user_links: decode_links(&items, keys::USER_LINKS),
            admin_links: decode_links(&items, keys::ADMIN_LINKS),
            categories: decode_strings(&items, keys::CATEGORIES),
            initialized: items
                .get(keys::INITIALIZED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            last_sync_time: decode_string(&items, keys::LAST_SYNC_TIME),
            last_update: decode_string(&items, keys::LAST_UPDATE),
        })
    }

    pub fn has_shared_links(&self) -> bool {
        !self.links.is_empty()
    }
}

/// Decodes each element on its own so one bad entry does not hide the rest.
pub(crate) fn decode_links(items: &HashMap<String, Value>, key: &str) -> Vec<Link> {
    match items.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| match serde_json::from_value(value.clone()) {
                Ok(link) => Some(link),
                Err(e) => {
                    tracing::warn!("Skipping malformed entry in {}: {}", key, e);
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!("Ignoring non-array value stored under {}: {}", key, other);
            Vec::new()
        }
    }
}

pub(crate) fn decode_strings(items: &HashMap<String, Value>, key: &str) -> Vec<String> {
    items
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_string(items: &HashMap<String, Value>, key: &str) -> Option<String> {
    items.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Batch of key writes applied in a single `Store::set`.
#[derive(Default)]
pub struct StateUpdate {
    items: HashMap<String, Value>,
    error: Option<serde_json::Error>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(self, links: &[Link]) -> Self {
        self.put(keys::LINKS, links)
    }

    pub fn user_links(self, links: &[Link]) -> Self {
        self.put(keys::USER_LINKS, links)
    }

    pub fn admin_links(self, links: &[Link]) -> Self {
        self.put(keys::ADMIN_LINKS, links)
    }

    pub fn categories(self, categories: &[String]) -> Self {
        self.put(keys::CATEGORIES, categories)
    }

    pub fn initialized(self, initialized: bool) -> Self {
        self.put(keys::INITIALIZED, &initialized)
    }

    pub fn last_sync_time(self, at: &str) -> Self {
        self.put(keys::LAST_SYNC_TIME, at)
    }

    pub fn last_update(self, at: &str) -> Self {
        self.put(keys::LAST_UPDATE, at)
    }

    /// Unix millis of the last successful fetch; 0 marks fallback data.
    pub fn last_api_success(self, millis: i64) -> Self {
        self.put(keys::LAST_API_SUCCESS, &millis)
    }

    fn put<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.items.insert(key.to_string(), value);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub async fn apply(self, store: &dyn Store) -> Result<(), StoreError> {
        if let Some(e) = self.error {
            return Err(StoreError::Serialization(e));
        }
        store.set(self.items).await
    }
}
