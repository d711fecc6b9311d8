use crate::library::Link;
use crate::sync::{ShareOutcome, SyncOutcome};
use crate::AppState;
use serde_json::Value;

/// Publish a link to the shared feed
pub async fn share_link(state: &AppState, link: Value) -> Result<ShareOutcome, String> {
    if !link.is_object() {
        return Err("Invalid link".to_string());
    }
    let link: Link = serde_json::from_value(link).map_err(|e| e.to_string())?;
    Ok(state.synchronizer.share_user_link(link).await)
}

/// Trigger a sync now
pub async fn force_sync(state: &AppState) -> SyncOutcome {
    tracing::info!("Sync requested");
    state.synchronizer.synchronize().await
}

pub async fn reset_to_defaults(state: &AppState) -> SyncOutcome {
    tracing::info!("Reset to defaults requested");
    state.synchronizer.reset_to_defaults().await
}

pub async fn refresh_links(state: &AppState) -> SyncOutcome {
    tracing::info!("Link refresh requested");
    state.synchronizer.refresh_links().await
}

pub fn get_api_url(state: &AppState) -> String {
    state.synchronizer.api_url()
}

/// Ask the host browser for the active tab
pub async fn get_current_tab(state: &AppState) -> Result<super::TabInfo, String> {
    let provider = state.tabs.as_ref().ok_or("No active tab")?;
    provider
        .current_tab()
        .await
        .ok_or_else(|| "No active tab".to_string())
}
