use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

use super::synchronizer::LinkSynchronizer;
use super::types::SyncOutcome;

const MIN_INTERVAL_MINUTES: u64 = 1;

/// Periodic sync trigger.
pub struct BackgroundSyncService {
    synchronizer: Arc<LinkSynchronizer>,
    interval_minutes: Arc<AtomicU64>,
    is_running: Arc<Mutex<bool>>,
    generation: Arc<AtomicU64>,
    wake: Arc<Notify>,
}

impl BackgroundSyncService {
    pub fn new(synchronizer: Arc<LinkSynchronizer>, interval_minutes: u64) -> Self {
        Self {
            synchronizer,
            interval_minutes: Arc::new(AtomicU64::new(interval_minutes.max(MIN_INTERVAL_MINUTES))),
            is_running: Arc::new(Mutex::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Start the background sync loop
    pub async fn start(&self) {
        let mut is_running = self.is_running.lock().await;
        if *is_running {
            return;
        }
        *is_running = true;
        drop(is_running);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        let synchronizer = self.synchronizer.clone();
        let interval = self.interval_minutes.clone();
        let is_running = self.is_running.clone();
        let wake = self.wake.clone();

        tracing::info!(
            "Background sync started (every {} minute(s))",
            interval.load(Ordering::SeqCst)
        );

        tokio::spawn(async move {
            loop {
                let minutes = interval.load(Ordering::SeqCst);
                let woken = tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(minutes * 60)) => false,
                    _ = wake.notified() => true,
                };

                let running = is_running.lock().await;
                if !*running || current.load(Ordering::SeqCst) != generation {
                    break;
                }
                drop(running);

                if woken {
                    // Interval changed; restart the wait.
                    continue;
                }
                Self::run_sync_cycle(&synchronizer).await;
            }
            tracing::debug!("Background sync loop {} exited", generation);
        });
    }

    /// Stop the background sync loop
    pub async fn stop(&self) {
        let mut is_running = self.is_running.lock().await;
        *is_running = false;
        drop(is_running);
        self.wake.notify_waiters();
        tracing::info!("Background sync stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.lock().await
    }

    /// Change the period; applies to the running loop immediately.
    pub fn set_interval(&self, minutes: u64) {
        let minutes = minutes.max(MIN_INTERVAL_MINUTES);
        self.interval_minutes.store(minutes, Ordering::SeqCst);
        self.wake.notify_waiters();
        tracing::info!("Sync interval set to {} minute(s)", minutes);
    }

    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes.load(Ordering::SeqCst)
    }

    /// One-time sync at install, update or process start.
    pub async fn run_startup_sync(&self) -> SyncOutcome {
        tracing::info!("Running startup sync");
        self.synchronizer.initialize().await
    }

    /// Run a single sync cycle
    async fn run_sync_cycle(synchronizer: &LinkSynchronizer) {
        tracing::info!("Starting sync cycle");
        let start = Instant::now();

        let outcome = synchronizer.synchronize().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if outcome.success {
            tracing::info!(
                "Sync cycle completed: {} link(s) in {}ms",
                outcome.link_count,
                duration_ms
            );
        } else {
            tracing::error!(
                "Sync cycle failed after {}ms: {}",
                duration_ms,
                outcome.error.unwrap_or_default()
            );
        }
    }
}
