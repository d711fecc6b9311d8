//! Sync data types and error definitions

use crate::db::StoreError;
use crate::library::defaults::ManifestError;
use crate::library::Link;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const OFFLINE_WARNING: &str = "Using offline demo links - couldn't connect to server";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("All {0} endpoint(s) failed")]
    AllEndpointsFailed(usize),

    #[error("Defaults unavailable: {0}")]
    Defaults(#[from] ManifestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Canonical result of one successful feed fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub endpoint: String,
    pub links: Vec<Link>,
    pub categories: Vec<String>,
}

/// Where the shared collection came from after a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    /// Replaced by the remote feed.
    Remote,
    /// Remote had nothing; the cached collection was kept.
    Cache,
    /// Remote had nothing and the cache was empty; loaded bundled defaults.
    Defaults,
}

/// Result of `synchronize`, `reset_to_defaults`, and `refresh_links`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SyncSource>,
    pub link_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn completed(source: SyncSource, link_count: usize) -> Self {
        let warning = (source == SyncSource::Defaults).then(|| OFFLINE_WARNING.to_string());
        Self {
            success: true,
            source: Some(source),
            link_count,
            warning,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            source: None,
            link_count: 0,
            warning: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of sharing a link to the remote feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShareOutcome {
    pub fn shared(link: Link) -> Self {
        Self {
            success: true,
            message: Some("Link shared successfully".to_string()),
            link: Some(link),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            message: None,
            link: None,
            error: Some(error.to_string()),
        }
    }
}
