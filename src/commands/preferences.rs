use crate::config::Settings;
use crate::AppState;

/// Get host settings
pub async fn get_settings(state: &AppState) -> Settings {
    state.settings.read().await.clone()
}

/// Save host settings. The sync interval applies at once; endpoint changes
/// take effect on the next start.
pub async fn save_settings(state: &AppState, settings: Settings) -> Result<Settings, String> {
    settings
        .save(state.store.as_ref())
        .await
        .map_err(|e| e.to_string())?;

    if let Some(bg_sync) = &state.background_sync {
        bg_sync.set_interval(settings.sync_interval_minutes);
    }

    *state.settings.write().await = settings.clone();
    tracing::info!("Saved settings");
    Ok(settings)
}
