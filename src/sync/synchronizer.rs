//! Reconciles the remote feed, the local cache and the bundled defaults.

use super::client::LinkFeed;
use super::types::{FeedSnapshot, ShareOutcome, SyncError, SyncOutcome, SyncSource};
use crate::db::Store;
use crate::library::{
    generate_id, now_iso, reconcile_categories, with_link_categories, BundledDefaults,
    DefaultsManifest, Installation, LibraryState, Link, StateUpdate, FALLBACK_CATEGORY,
};
use crate::notifications::{LinkEvent, Notifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub struct LinkSynchronizer {
    store: Arc<dyn Store>,
    feed: Arc<dyn LinkFeed>,
    defaults: BundledDefaults,
    notifier: Notifier,
    installation: Installation,
    /// Held for the whole of a sync, reset or refresh. Holds the last sync outcome.
    flight: Mutex<Option<SyncOutcome>>,
    /// Number of finished sync runs.
    completed: AtomicU64,
}

impl LinkSynchronizer {
    pub fn new(
        store: Arc<dyn Store>,
        feed: Arc<dyn LinkFeed>,
        defaults: BundledDefaults,
        notifier: Notifier,
        installation: Installation,
    ) -> Self {
        Self {
            store,
            feed,
            defaults,
            notifier,
            installation,
            flight: Mutex::new(None),
            completed: AtomicU64::new(0),
        }
    }

    pub fn api_url(&self) -> String {
        self.feed.api_url()
    }

    pub fn user_id(&self) -> &str {
        self.installation.user_id()
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn canonical_categories(&self) -> Vec<String> {
        match self.defaults.load().await {
            Ok(manifest) => manifest.categories,
            Err(e) => {
                tracing::warn!("Could not load default categories: {}", e);
                vec![FALLBACK_CATEGORY.to_string()]
            }
        }
    }

    /// Pull the remote feed into the local cache.
    ///
    /// A caller that arrives while another sync is running waits for it and
    /// returns its outcome.
    pub async fn synchronize(&self) -> SyncOutcome {
        let seen = self.completed.load(Ordering::SeqCst);
        let mut guard = self.flight.lock().await;

        if self.completed.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = guard.as_ref() {
                tracing::debug!("Joined in-flight sync");
                return outcome.clone();
            }
        }

        self.synchronize_locked(&mut guard).await
    }

    async fn synchronize_locked(&self, guard: &mut MutexGuard<'_, Option<SyncOutcome>>) -> SyncOutcome {
        let outcome = match self.run_sync().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Sync failed: {}", e);
                SyncOutcome::failed(e)
            }
        };

        self.notifier.notify(LinkEvent::LinksUpdated);
        **guard = Some(outcome.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        let fetched = match self.feed.fetch_links().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Remote fetch failed, treating as empty: {}", e);
                FeedSnapshot::default()
            }
        };

        if !fetched.links.is_empty() {
            return self.store_remote(fetched).await;
        }

        let state = LibraryState::load(self.store()).await?;
        if state.has_shared_links() {
            tracing::info!(
                "Remote returned no links, keeping {} cached link(s)",
                state.links.len()
            );
            return Ok(SyncOutcome::completed(SyncSource::Cache, state.links.len()));
        }

        tracing::info!("No remote or cached links, loading bundled defaults");
        let manifest = self.defaults.load().await?;
        let categories = with_link_categories(
            reconcile_categories(&state.categories, &[], &manifest.categories),
            &manifest.admin_links,
            &state.user_links,
        );
        let count = self.install_defaults(&manifest, &state, categories).await?;
        Ok(SyncOutcome::completed(SyncSource::Defaults, count))
    }

    async fn store_remote(&self, fetched: FeedSnapshot) -> Result<SyncOutcome, SyncError> {
        let state = LibraryState::load(self.store()).await?;
        let manifest = self.defaults.load().await?;

        let categories = with_link_categories(
            reconcile_categories(&state.categories, &fetched.categories, &manifest.categories),
            &fetched.links,
            &state.user_links,
        );

        StateUpdate::new()
            .links(&fetched.links)
            .admin_links(&fetched.links)
            .categories(&categories)
            .initialized(true)
            .last_sync_time(&now_iso())
            .last_api_success(chrono::Utc::now().timestamp_millis())
            .apply(self.store())
            .await?;

        if categories != state.categories {
            self.notifier.notify(LinkEvent::CategoriesUpdated);
        }

        tracing::info!(
            "Stored {} link(s) from {}",
            fetched.links.len(),
            fetched.endpoint
        );
        Ok(SyncOutcome::completed(SyncSource::Remote, fetched.links.len()))
    }

    async fn install_defaults(
        &self,
        manifest: &DefaultsManifest,
        state: &LibraryState,
        categories: Vec<String>,
    ) -> Result<usize, SyncError> {
        StateUpdate::new()
            .links(&manifest.admin_links)
            .admin_links(&manifest.admin_links)
            .categories(&categories)
            .initialized(true)
            .last_update(&now_iso())
            .last_api_success(0)
            .apply(self.store())
            .await?;

        if categories != state.categories {
            self.notifier.notify(LinkEvent::CategoriesUpdated);
        }
        Ok(manifest.admin_links.len())
    }

    /// Replace the shared collection and the registry with the bundled
    /// defaults. User links are kept, and so are their categories.
    pub async fn reset_to_defaults(&self) -> SyncOutcome {
        let _guard = self.flight.lock().await;

        let result = async {
            let state = LibraryState::load(self.store()).await?;
            let manifest = self.defaults.load().await?;
            let categories = with_link_categories(
                reconcile_categories(&manifest.categories, &[], &[]),
                &manifest.admin_links,
                &state.user_links,
            );
            self.install_defaults(&manifest, &state, categories).await
        }
        .await;

        self.notifier.notify(LinkEvent::LinksUpdated);
        self.notifier.notify(LinkEvent::CategoriesUpdated);

        match result {
            Ok(count) => {
                tracing::info!("Reset to {} default link(s)", count);
                SyncOutcome {
                    warning: None,
                    ..SyncOutcome::completed(SyncSource::Defaults, count)
                }
            }
            Err(e) => {
                tracing::error!("Reset to defaults failed: {}", e);
                SyncOutcome::failed(e)
            }
        }
    }

    /// Drop the cached shared links and fetch again. With every endpoint
    /// down this ends on the bundled defaults.
    pub async fn refresh_links(&self) -> SyncOutcome {
        let mut guard = self.flight.lock().await;

        let cleared = async {
            let state = LibraryState::load(self.store()).await?;
            let had_content = !state.links.is_empty() || !state.admin_links.is_empty();
            StateUpdate::new()
                .links(&[])
                .admin_links(&[])
                .apply(self.store())
                .await?;
            Ok::<bool, SyncError>(had_content)
        }
        .await;

        match cleared {
            Ok(had_content) => {
                tracing::info!("Refreshing links (had cached content: {})", had_content);
                self.synchronize_locked(&mut guard).await
            }
            Err(e) => {
                tracing::error!("Could not clear cached links: {}", e);
                SyncOutcome::failed(e)
            }
        }
    }

    /// Append a link to the remote feed, then sync.
    ///
    /// Read-modify-write without conflict detection: two concurrent shares
    /// can overwrite each other.
    pub async fn share_user_link(&self, link: Link) -> ShareOutcome {
        let shared = Link {
            id: generate_id("shared"),
            title: Some(link.title.unwrap_or_default()),
            url: link.url,
            category: Some(
                link.category
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| FALLBACK_CATEGORY.to_string()),
            ),
            tags: link.tags,
            description: Some(link.description.unwrap_or_default()),
            shared_by: Some(self.user_id().to_string()),
            shared_at: Some(now_iso()),
            ..Link::default()
        };

        match self.publish_link(&shared).await {
            Ok(()) => {
                tracing::info!("Shared link {} ({})", shared.id, shared.url);
                let sync = self.synchronize().await;
                if !sync.success {
                    tracing::warn!("Sync after share did not complete: {:?}", sync.error);
                }
                ShareOutcome::shared(shared)
            }
            Err(e) => {
                tracing::error!("Error sharing link: {}", e);
                ShareOutcome::failed(format!("Failed to share link: {}", e))
            }
        }
    }

    async fn publish_link(&self, link: &Link) -> Result<(), SyncError> {
        let mut published = self.feed.fetch_published().await?;
        let entry = serde_json::to_value(link)
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
        published.push(entry);
        self.feed.publish(published).await
    }

    /// Startup: fold the default categories into the registry, sync, and log
    /// what ended up in storage.
    pub async fn initialize(&self) -> SyncOutcome {
        if let Err(e) = self.reconcile_registry().await {
            tracing::warn!("Category reconciliation failed: {}", e);
        }

        let outcome = self.synchronize().await;

        match LibraryState::load(self.store()).await {
            Ok(state) => tracing::info!(
                "Storage: {} shared link(s), {} user link(s), {} categories, initialized={}",
                state.links.len(),
                state.user_links.len(),
                state.categories.len(),
                state.initialized
            ),
            Err(e) => tracing::warn!("Could not read storage summary: {}", e),
        }
        outcome
    }

    async fn reconcile_registry(&self) -> Result<(), SyncError> {
        let state = LibraryState::load(self.store()).await?;
        let manifest = self.defaults.load().await?;
        let categories = with_link_categories(
            reconcile_categories(&state.categories, &[], &manifest.categories),
            &state.links,
            &state.user_links,
        );

        if categories != state.categories {
            StateUpdate::new()
                .categories(&categories)
                .apply(self.store())
                .await?;
            self.notifier.notify(LinkEvent::CategoriesUpdated);
            tracing::info!("Category registry now has {} entries", categories.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::library::{keys, DefaultsManifest};
    use crate::sync::client::FeedClient;
    use crate::test_support::{shared_link, MockEndpoint, Reply, ScriptedFeed};
    use std::time::Duration;

    fn synchronizer(store: Arc<MemoryStore>, feed: Arc<dyn LinkFeed>) -> LinkSynchronizer {
        LinkSynchronizer::new(
            store,
            feed,
            BundledDefaults::default(),
            Notifier::new(),
            Installation::anonymous(),
        )
    }

    fn embedded() -> DefaultsManifest {
        DefaultsManifest::embedded().unwrap()
    }

    #[tokio::test]
    async fn test_remote_links_replace_shared_collection() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        let fetched = vec![shared_link("a", "X"), shared_link("b", "Maps")];
        feed.push_links(fetched.clone(), &["X"]);

        StateUpdate::new()
            .links(&[shared_link("old", "Maps")])
            .apply(store.as_ref())
            .await
            .unwrap();

        let sync = synchronizer(store.clone(), feed);
        let outcome = sync.synchronize().await;
        assert!(outcome.success);
        assert_eq!(outcome.source, Some(SyncSource::Remote));

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, fetched);
        assert_eq!(state.admin_links, fetched);
        assert!(state.initialized);
        assert!(state.last_sync_time.is_some());
        assert_eq!(state.categories[0], "X");
        assert!(state.categories.iter().any(|c| c == "Maps"));
        assert!(state.categories.iter().any(|c| c == "Other"));
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_cache() {
        let store = Arc::new(MemoryStore::new());
        let cached = vec![shared_link("cached", "Maps")];
        StateUpdate::new()
            .links(&cached)
            .categories(&["Maps".to_string()])
            .apply(store.as_ref())
            .await
            .unwrap();

        let feed = ScriptedFeed::new();
        feed.push_links(vec![], &["Ignored"]);
        feed.push_failure("unreachable");

        let sync = synchronizer(store.clone(), feed);
        for _ in 0..2 {
            let outcome = sync.synchronize().await;
            assert!(outcome.success);
            assert_eq!(outcome.source, Some(SyncSource::Cache));
            assert!(outcome.warning.is_none());
        }

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, cached);
        assert_eq!(state.categories, vec!["Maps"]);
    }

    #[tokio::test]
    async fn test_empty_fetch_without_cache_loads_defaults() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone(), ScriptedFeed::new());

        let outcome = sync.synchronize().await;
        assert!(outcome.success);
        assert_eq!(outcome.source, Some(SyncSource::Defaults));
        assert_eq!(outcome.warning.as_deref(), Some(crate::sync::OFFLINE_WARNING));

        let manifest = embedded();
        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, manifest.admin_links);
        assert_eq!(state.categories, manifest.categories);
        assert!(state.initialized);

        let items = store.get(&[keys::LAST_API_SUCCESS]).await.unwrap();
        assert_eq!(items[keys::LAST_API_SUCCESS], serde_json::json!(0));
    }

    #[tokio::test]
    async fn test_linkless_override_never_empties_shared_links() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"adminLinks": [], "categories": ["A"]}}"#).unwrap();

        let store = Arc::new(MemoryStore::new());
        let sync = LinkSynchronizer::new(
            store.clone(),
            ScriptedFeed::new(),
            BundledDefaults::new(Some(file.path().to_path_buf())),
            Notifier::new(),
            Installation::anonymous(),
        );

        let outcome = sync.synchronize().await;
        assert_eq!(outcome.source, Some(SyncSource::Defaults));
        assert_eq!(outcome.link_count, embedded().admin_links.len());

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert!(!state.links.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_install_without_network() {
        let store = Arc::new(MemoryStore::new());
        let installation = Installation::ensure(store.as_ref()).await.unwrap();
        let sync = LinkSynchronizer::new(
            store.clone(),
            ScriptedFeed::new(),
            BundledDefaults::default(),
            Notifier::new(),
            installation.clone(),
        );

        let outcome = sync.initialize().await;
        assert!(outcome.success);

        let manifest = embedded();
        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, manifest.admin_links);
        assert_eq!(state.categories, manifest.categories);

        let again = Installation::ensure(store.as_ref()).await.unwrap();
        assert_eq!(again, installation);
        assert_eq!(sync.user_id(), installation.user_id());
    }

    #[tokio::test]
    async fn test_every_sync_notifies() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        feed.push_failure("down");
        let sync = synchronizer(store, feed);
        let mut events = sync.notifier().subscribe();

        sync.synchronize().await;
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&LinkEvent::LinksUpdated));
    }

    #[tokio::test]
    async fn test_storage_failure_becomes_failed_outcome() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let sync = synchronizer(store, ScriptedFeed::new());

        let outcome = sync.synchronize().await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Storage"));
    }

    #[tokio::test]
    async fn test_concurrent_syncs_share_one_run() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        feed.push_links(vec![shared_link("a", "Maps")], &[]);
        feed.push_links(vec![shared_link("b", "Maps")], &[]);
        let sync = synchronizer(store, feed.clone());

        let (first, second) = tokio::join!(sync.synchronize(), sync.synchronize());
        assert_eq!(feed.fetch_calls(), 1);
        assert_eq!(first.link_count, second.link_count);
        assert_eq!(first.source, second.source);

        sync.synchronize().await;
        assert_eq!(feed.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_to_defaults_keeps_user_links() {
        let store = Arc::new(MemoryStore::new());
        let mine = Link {
            id: "user_1".into(),
            url: "https://mine.io".into(),
            category: Some("Personal".into()),
            ..Link::default()
        };
        StateUpdate::new()
            .links(&[shared_link("remote", "X")])
            .user_links(std::slice::from_ref(&mine))
            .categories(&["X".to_string()])
            .apply(store.as_ref())
            .await
            .unwrap();

        let sync = synchronizer(store.clone(), ScriptedFeed::new());
        let outcome = sync.reset_to_defaults().await;
        assert!(outcome.success);
        assert!(outcome.warning.is_none());

        let manifest = embedded();
        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, manifest.admin_links);
        assert_eq!(state.user_links, vec![mine]);
        assert!(!state.categories.iter().any(|c| c == "X"));
        assert_eq!(state.categories.last().map(String::as_str), Some("Personal"));
        assert!(state.initialized);
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_defaults_when_offline() {
        let store = Arc::new(MemoryStore::new());
        StateUpdate::new()
            .links(&[shared_link("stale", "Maps")])
            .admin_links(&[shared_link("stale", "Maps")])
            .apply(store.as_ref())
            .await
            .unwrap();

        let sync = synchronizer(store.clone(), ScriptedFeed::new());
        let outcome = sync.refresh_links().await;
        assert_eq!(outcome.source, Some(SyncSource::Defaults));
        assert!(outcome.warning.is_some());

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links, embedded().admin_links);
    }

    #[tokio::test]
    async fn test_share_publishes_and_syncs() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        let sync = synchronizer(store.clone(), feed.clone());

        let input: Link = serde_json::from_value(serde_json::json!({
            "title": "Docs",
            "url": "https://docs.rs",
            "tags": "not-a-list"
        }))
        .unwrap();
        feed.push_links(vec![shared_link("after", "Other")], &[]);

        let outcome = sync.share_user_link(input).await;
        assert!(outcome.success);
        let shared = outcome.link.unwrap();
        assert!(shared.id.starts_with("shared_"));
        assert_eq!(shared.category.as_deref(), Some("Other"));
        assert!(shared.tags.is_empty());
        assert_eq!(shared.shared_by.as_deref(), Some("anonymous"));
        assert!(shared.shared_at.is_some());

        let published = feed.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["id"], serde_json::json!(shared.id));

        assert_eq!(feed.fetch_calls(), 1);
        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links[0].id, "after");
    }

    #[tokio::test]
    async fn test_share_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        feed.fail_publish("HTTP 500");
        let sync = synchronizer(store, feed.clone());

        let outcome = sync.share_user_link(shared_link("x", "Maps")).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Failed to share link"));
        assert_eq!(feed.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_shares_keep_at_least_one() {
        let store = Arc::new(MemoryStore::new());
        let feed = ScriptedFeed::new();
        feed.set_publish_delay(Duration::from_millis(20));
        let sync = synchronizer(store, feed.clone());

        let (a, b) = tokio::join!(
            sync.share_user_link(shared_link("first", "Maps")),
            sync.share_user_link(shared_link("second", "Maps")),
        );
        assert!(a.success && b.success);

        // Both read the same initial list, so one write may clobber the other.
        let published = feed.published();
        assert!(!published.is_empty());
        assert!(published.len() <= 2);
    }

    #[tokio::test]
    async fn test_remote_scenario_through_http_client() {
        let endpoint = MockEndpoint::start(Reply::json(
            200,
            r#"{"links": [{"title": "A", "url": "a.com"}], "categories": ["X"]}"#,
        ))
        .await;
        let client = FeedClient::new(vec![endpoint.url()], Duration::from_secs(2));
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone(), Arc::new(client));

        let outcome = sync.synchronize().await;
        assert_eq!(outcome.source, Some(SyncSource::Remote));

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.links.len(), 1);
        assert!(state.links[0].id.starts_with("shared_"));
        assert!(state.links[0].is_shared);
        assert_eq!(state.links[0].url, "a.com");
        assert!(state.categories.iter().any(|c| c == "X"));
        assert!(state.categories.iter().any(|c| c == "Other"));
    }

    #[tokio::test]
    async fn test_all_endpoints_timing_out_degrades_to_defaults() {
        let a = MockEndpoint::start(Reply::Hang).await;
        let b = MockEndpoint::start(Reply::Hang).await;
        let c = MockEndpoint::start(Reply::Hang).await;
        let client = FeedClient::new(vec![a.url(), b.url(), c.url()], Duration::from_millis(200));
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone(), Arc::new(client));

        let outcome = sync.synchronize().await;
        assert!(outcome.success);
        assert_eq!(outcome.source, Some(SyncSource::Defaults));

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert!(!state.links.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_merges_default_categories() {
        let store = Arc::new(MemoryStore::new());
        StateUpdate::new()
            .links(&[shared_link("cached", "Custom")])
            .categories(&["Custom".to_string()])
            .apply(store.as_ref())
            .await
            .unwrap();

        let sync = synchronizer(store.clone(), ScriptedFeed::new());
        sync.initialize().await;

        let state = LibraryState::load(store.as_ref()).await.unwrap();
        assert_eq!(state.categories[0], "Custom");
        for category in embedded().categories {
            assert!(state.categories.contains(&category));
        }
        assert_eq!(state.links.len(), 1);
    }
}
