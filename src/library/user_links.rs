//! Local edits: user-link CRUD, categories, export and import.
//!
//! None of this touches the remote feed. Callers notify listeners after a
//! successful mutation.

use super::categories::{contains, extend_unique, with_link_categories};
use super::state::{decode_links, decode_strings, keys, LibraryState, StateUpdate};
use super::types::{generate_id, normalize_url, now_iso, Link, LinkDraft, FALLBACK_CATEGORY};
use crate::db::{Store, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0}")]
    Validation(String),

    #[error("Link not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// A user link as written, and whether its category was new to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedLink {
    pub link: Link,
    pub categories_changed: bool,
}

/// Create a user link from form input and append it to `userLinks`.
pub async fn add_user_link(store: &dyn Store, draft: LinkDraft) -> Result<SavedLink, LibraryError> {
    let mut link = Link {
        id: generate_id("user"),
        date_added: Some(now_iso()),
        ..Link::default()
    };
    apply_draft(&mut link, draft)?;

    let mut state = LibraryState::load(store).await?;
    state.user_links.push(link.clone());
    let categories_changed = save_user_links(store, &state).await?;

    tracing::info!("Added user link {} ({})", link.id, link.url);
    Ok(SavedLink {
        link,
        categories_changed,
    })
}

/// Edit a user link in place. Shared links are not editable.
pub async fn update_user_link(
    store: &dyn Store,
    id: &str,
    draft: LinkDraft,
) -> Result<SavedLink, LibraryError> {
    let mut state = LibraryState::load(store).await?;
    let link = state
        .user_links
        .iter_mut()
        .find(|link| link.id == id)
        .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

    apply_draft(link, draft)?;
    link.last_updated = Some(now_iso());
    let updated = link.clone();
    let categories_changed = save_user_links(store, &state).await?;

    tracing::info!("Updated user link {}", id);
    Ok(SavedLink {
        link: updated,
        categories_changed,
    })
}

/// Write `userLinks`, plus the registry when a link names a category it lacks.
async fn save_user_links(store: &dyn Store, state: &LibraryState) -> Result<bool, LibraryError> {
    let categories = with_link_categories(state.categories.clone(), &state.links, &state.user_links);
    let changed = categories != state.categories;

    let mut update = StateUpdate::new().user_links(&state.user_links);
    if changed {
        tracing::info!("Registering categories used by user links: {:?}", categories);
        update = update.categories(&categories);
    }
    update.apply(store).await?;
    Ok(changed)
}

/// Remove the id from every collection that holds it.
pub async fn delete_link(store: &dyn Store, id: &str) -> Result<(), LibraryError> {
    let mut state = LibraryState::load(store).await?;

    let before = (state.links.len(), state.admin_links.len(), state.user_links.len());
    state.links.retain(|link| link.id != id);
    state.admin_links.retain(|link| link.id != id);
    state.user_links.retain(|link| link.id != id);
    let after = (state.links.len(), state.admin_links.len(), state.user_links.len());

    if before == after {
        return Err(LibraryError::NotFound(id.to_string()));
    }

    let mut update = StateUpdate::new();
    if before.0 != after.0 {
        update = update.links(&state.links);
    }
    if before.1 != after.1 {
        update = update.admin_links(&state.admin_links);
    }
    if before.2 != after.2 {
        update = update.user_links(&state.user_links);
    }
    update.apply(store).await?;

    tracing::info!("Deleted link {}", id);
    Ok(())
}

/// Append a new category to the registry and return the registry.
pub async fn add_category(store: &dyn Store, name: &str) -> Result<Vec<String>, LibraryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LibraryError::Validation("Category name is required".into()));
    }

    let mut state = LibraryState::load(store).await?;
    if contains(&state.categories, name) {
        return Err(LibraryError::Validation(format!(
            "Category \"{}\" already exists",
            name
        )));
    }

    extend_unique(&mut state.categories, [name]);
    StateUpdate::new()
        .categories(&state.categories)
        .apply(store)
        .await?;

    tracing::info!("Added category {}", name);
    Ok(state.categories)
}

/// Empty the shared collection and its mirror. User links stay.
pub async fn clear_links(store: &dyn Store) -> Result<(), LibraryError> {
    StateUpdate::new()
        .links(&[])
        .admin_links(&[])
        .apply(store)
        .await?;
    tracing::info!("Cleared shared links");
    Ok(())
}

fn apply_draft(link: &mut Link, draft: LinkDraft) -> Result<(), LibraryError> {
    let title = draft.title.trim();
    let url = draft.url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(LibraryError::Validation("Title and URL are required".into()));
    }

    link.title = Some(title.to_string());
    link.url = normalize_url(url);
    link.category = Some(
        draft
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string()),
    );
    link.tags = draft.tags;
    link.description = draft
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Ok(())
}

/// Backup file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_links: Option<Vec<Link>>,
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
}

pub async fn export_data(store: &dyn Store) -> Result<ExportBundle, LibraryError> {
    let state = LibraryState::load(store).await?;
    Ok(ExportBundle {
        links: state.links,
        user_links: Some(state.user_links),
        categories: state.categories,
        export_date: Some(now_iso()),
    })
}

/// Restore a backup. `links` and `categories` must both be arrays.
pub async fn import_data(store: &dyn Store, data: Value) -> Result<ExportBundle, LibraryError> {
    let Value::Object(object) = data else {
        return Err(LibraryError::Validation("Invalid data format".into()));
    };
    let items: HashMap<String, Value> = object.into_iter().collect();

    let is_array = |key: &str| items.get(key).is_some_and(Value::is_array);
    if !is_array(keys::LINKS) || !is_array(keys::CATEGORIES) {
        return Err(LibraryError::Validation("Invalid data format".into()));
    }

    let mut bundle = ExportBundle {
        links: decode_links(&items, keys::LINKS),
        user_links: is_array(keys::USER_LINKS).then(|| decode_links(&items, keys::USER_LINKS)),
        categories: decode_strings(&items, keys::CATEGORIES),
        export_date: items
            .get("exportDate")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    // User links absent from the backup stay, so their categories must too.
    let kept_user_links = match &bundle.user_links {
        Some(_) => Vec::new(),
        None => LibraryState::load(store).await?.user_links,
    };
    bundle.categories = with_link_categories(
        std::mem::take(&mut bundle.categories),
        &bundle.links,
        bundle.user_links.as_deref().unwrap_or(&kept_user_links[..]),
    );

    let mut update = StateUpdate::new()
        .links(&bundle.links)
        .categories(&bundle.categories);
    if let Some(user_links) = &bundle.user_links {
        update = update.user_links(user_links);
    }
    update.apply(store).await?;

    tracing::info!(
        "Imported {} shared link(s), {} user link(s), {} categories",
        bundle.links.len(),
        bundle.user_links.as_ref().map_or(0, Vec::len),
        bundle.categories.len()
    );
    Ok(bundle)
}
