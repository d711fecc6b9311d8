// Library entry point for the link library host
pub mod commands;
pub mod config;
pub mod db;
pub mod host;
pub mod library;
pub mod notifications;
pub mod sync;

#[cfg(test)]
mod test_support;

use commands::TabProvider;
use config::Settings;
use db::Store;
use library::{BundledDefaults, Installation};
use notifications::Notifier;
use std::sync::Arc;
use sync::{BackgroundSyncService, FeedClient, LinkFeed, LinkSynchronizer};
use tokio::sync::RwLock;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub synchronizer: Arc<LinkSynchronizer>,
    pub background_sync: Option<Arc<BackgroundSyncService>>,
    pub settings: RwLock<Settings>,
    pub tabs: Option<Arc<dyn TabProvider>>,
}

impl AppState {
    /// Wire everything against the endpoints named in `settings`.
    pub async fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        let feed = Arc::new(FeedClient::from_settings(&settings));
        Self::with_feed(store, settings, feed).await
    }

    pub async fn with_feed(
        store: Arc<dyn Store>,
        settings: Settings,
        feed: Arc<dyn LinkFeed>,
    ) -> Self {
        let installation = match Installation::ensure(store.as_ref()).await {
            Ok(installation) => installation,
            Err(e) => {
                tracing::error!("Could not persist user id, continuing anonymously: {}", e);
                Installation::anonymous()
            }
        };

        let notifier = Notifier::new();
        let synchronizer = Arc::new(LinkSynchronizer::new(
            store.clone(),
            feed,
            BundledDefaults::new(settings.defaults_path.clone()),
            notifier.clone(),
            installation,
        ));
        let background_sync = BackgroundSyncService::new(
            synchronizer.clone(),
            settings.sync_interval_minutes,
        );

        Self {
            store,
            notifier,
            synchronizer,
            background_sync: Some(Arc::new(background_sync)),
            settings: RwLock::new(settings),
            tabs: None,
        }
    }

    pub fn with_tab_provider(mut self, tabs: Arc<dyn TabProvider>) -> Self {
        self.tabs = Some(tabs);
        self
    }
}
