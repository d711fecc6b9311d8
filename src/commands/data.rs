use crate::library::{
    self, ExportBundle, LibraryState, LibraryView, Link, LinkDraft, SavedLink, SearchResults,
};
use crate::notifications::LinkEvent;
use crate::AppState;
use serde_json::Value;

pub async fn add_link(state: &AppState, draft: LinkDraft) -> Result<Link, String> {
    let saved = library::add_user_link(state.store.as_ref(), draft)
        .await
        .map_err(|e| e.to_string())?;
    Ok(announce(state, saved))
}

pub async fn update_link(state: &AppState, id: &str, draft: LinkDraft) -> Result<Link, String> {
    let saved = library::update_user_link(state.store.as_ref(), id, draft)
        .await
        .map_err(|e| e.to_string())?;
    Ok(announce(state, saved))
}

fn announce(state: &AppState, saved: SavedLink) -> Link {
    state.notifier.notify(LinkEvent::LinksUpdated);
    if saved.categories_changed {
        state.notifier.notify(LinkEvent::CategoriesUpdated);
    }
    saved.link
}

pub async fn delete_link(state: &AppState, id: &str) -> Result<(), String> {
    library::delete_link(state.store.as_ref(), id)
        .await
        .map_err(|e| e.to_string())?;
    state.notifier.notify(LinkEvent::LinksUpdated);
    Ok(())
}

pub async fn add_category(state: &AppState, name: &str) -> Result<Vec<String>, String> {
    let categories = library::add_category(state.store.as_ref(), name)
        .await
        .map_err(|e| e.to_string())?;
    state.notifier.notify(LinkEvent::CategoriesUpdated);
    Ok(categories)
}

/// Empty the shared collection (user links are kept)
pub async fn clear_links(state: &AppState) -> Result<(), String> {
    library::clear_links(state.store.as_ref())
        .await
        .map_err(|e| e.to_string())?;
    state.notifier.notify(LinkEvent::LinksUpdated);
    Ok(())
}

pub async fn export_data(state: &AppState) -> Result<ExportBundle, String> {
    library::export_data(state.store.as_ref())
        .await
        .map_err(|e| e.to_string())
}

pub async fn import_data(state: &AppState, data: Value) -> Result<(), String> {
    library::import_data(state.store.as_ref(), data)
        .await
        .map_err(|e| e.to_string())?;
    state.notifier.notify(LinkEvent::LinksUpdated);
    state.notifier.notify(LinkEvent::CategoriesUpdated);
    Ok(())
}

/// Grouped library for display. Syncs first when nothing is stored yet.
pub async fn get_library(state: &AppState) -> Result<LibraryView, String> {
    let mut current = LibraryState::load(state.store.as_ref())
        .await
        .map_err(|e| e.to_string())?;

    if current.links.is_empty() && current.admin_links.is_empty() && current.user_links.is_empty()
    {
        tracing::info!("No links stored, syncing before building the library");
        state.synchronizer.synchronize().await;
        current = LibraryState::load(state.store.as_ref())
            .await
            .map_err(|e| e.to_string())?;
    }

    let canonical = state.synchronizer.canonical_categories().await;
    Ok(library::build_view(&current, &canonical))
}

pub async fn search(
    state: &AppState,
    term: &str,
    category: Option<&str>,
) -> Result<SearchResults, String> {
    let current = LibraryState::load(state.store.as_ref())
        .await
        .map_err(|e| e.to_string())?;
    let canonical = state.synchronizer.canonical_categories().await;
    Ok(library::search(&current, &canonical, term, category))
}
