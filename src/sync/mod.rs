//! Link feed synchronization

pub mod background;
pub mod client;
pub mod synchronizer;
pub mod types;

// Re-export commonly used types
pub use background::BackgroundSyncService;
pub use client::{normalize_feed, FeedClient, LinkFeed};
pub use synchronizer::LinkSynchronizer;
pub use types::{FeedSnapshot, ShareOutcome, SyncError, SyncOutcome, SyncSource, OFFLINE_WARNING};
