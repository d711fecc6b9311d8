//! Per-installation user id. Generated once on first start and never changed.

use super::state::keys;
use super::types::generate_id;
use crate::db::{Store, StoreError};
use serde_json::Value;
use std::collections::HashMap;

const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    user_id: String,
}

impl Installation {
    /// Return the persisted identity, creating and persisting one if absent.
    pub async fn ensure(store: &dyn Store) -> Result<Self, StoreError> {
        let items = store.get(&[keys::USER_ID]).await?;

        if let Some(user_id) = items
            .get(keys::USER_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        {
            tracing::debug!("Using existing user id: {}", user_id);
            return Ok(Self {
                user_id: user_id.to_string(),
            });
        }

        let user_id = generate_id("user");
        store
            .set(HashMap::from([(
                keys::USER_ID.to_string(),
                Value::String(user_id.clone()),
            )]))
            .await?;

        tracing::info!("Generated new user id: {}", user_id);
        Ok(Self { user_id })
    }

    /// Identity used when the store could not provide one.
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS.to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
