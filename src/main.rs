use linklib::config::{self, Settings};
use linklib::db::{Database, SqliteStore, Store};
use linklib::host;
use linklib::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the message protocol, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("linklib=info")),
        )
        .init();

    let db = Arc::new(Database::open(&config::database_path()).await?);
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(db));

    let settings = Settings::load(store.as_ref()).await;
    tracing::info!(
        "Loaded settings: {} endpoint(s), sync every {} minute(s)",
        settings.api_endpoints.len(),
        settings.sync_interval_minutes
    );

    let state = Arc::new(AppState::new(store, settings).await);

    if let Some(bg_sync) = state.background_sync.clone() {
        bg_sync.start().await;
        tokio::spawn(async move {
            bg_sync.run_startup_sync().await;
        });
    }

    host::serve(state.clone(), tokio::io::stdin(), tokio::io::stdout()).await?;

    if let Some(bg_sync) = &state.background_sync {
        bg_sync.stop().await;
    }
    tracing::info!("Host exiting");
    Ok(())
}
