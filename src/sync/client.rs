//! Remote link-feed client with ordered endpoint fallback

use super::types::{FeedSnapshot, SyncError};
use crate::config::Settings;
use crate::library::{generate_id, Link};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static CACHE_BUST_SEQ: AtomicU64 = AtomicU64::new(0);

/// The remote side of synchronization.
#[async_trait]
pub trait LinkFeed: Send + Sync {
    /// Fetch and normalize the shared link set, trying each endpoint in order.
    async fn fetch_links(&self) -> Result<FeedSnapshot, SyncError>;

    /// Raw `links` entries currently stored at the publish endpoint.
    async fn fetch_published(&self) -> Result<Vec<Value>, SyncError>;

    /// Overwrite the publish endpoint with `{ links }`.
    async fn publish(&self, links: Vec<Value>) -> Result<(), SyncError>;

    /// URL reported to the UI.
    fn api_url(&self) -> String;
}

pub struct FeedClient {
    http: Client,
    endpoints: Vec<String>,
    publish_url: String,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        let publish_url = endpoints.first().cloned().unwrap_or_default();
        Self {
            http: Client::new(),
            endpoints,
            publish_url,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_endpoints.clone(), settings.request_timeout())
            .with_publish_url(settings.publish_url().to_string())
    }

    pub fn with_publish_url(mut self, url: String) -> Self {
        self.publish_url = url;
        self
    }

    /// GET one URL with a unique cache-busting parameter and parse the body.
    async fn get_json(&self, url: &str) -> Result<Value, SyncError> {
        let response = self
            .http
            .get(url)
            .query(&[("cachebust", cache_bust_token())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify(url, e))?;
        serde_json::from_str(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl LinkFeed for FeedClient {
    async fn fetch_links(&self) -> Result<FeedSnapshot, SyncError> {
        for (index, url) in self.endpoints.iter().enumerate() {
            tracing::debug!(
                "Trying feed endpoint {}/{}: {}",
                index + 1,
                self.endpoints.len(),
                url
            );

            let attempt = match self.get_json(url).await {
                Ok(body) => normalize_feed(url, body),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(snapshot) => {
                    tracing::info!(
                        "Fetched {} link(s) and {} categories from {}",
                        snapshot.links.len(),
                        snapshot.categories.len(),
                        url
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    tracing::warn!("Abandoning feed endpoint {}: {}", url, e);
                }
            }
        }

        Err(SyncError::AllEndpointsFailed(self.endpoints.len()))
    }

    async fn fetch_published(&self) -> Result<Vec<Value>, SyncError> {
        let body = self.get_json(&self.publish_url).await?;
        Ok(match body.get("links") {
            Some(Value::Array(links)) => links.clone(),
            _ => Vec::new(),
        })
    }

    async fn publish(&self, links: Vec<Value>) -> Result<(), SyncError> {
        let count = links.len();
        let response = self
            .http
            .post(&self.publish_url)
            .json(&json!({ "links": links }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(&self.publish_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                url: self.publish_url.clone(),
                status: status.as_u16(),
            });
        }

        tracing::info!("Published {} link(s) to {}", count, self.publish_url);
        Ok(())
    }

    fn api_url(&self) -> String {
        self.publish_url.clone()
    }
}

fn classify(url: &str, err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout(url.to_string())
    } else {
        SyncError::Http(err)
    }
}

/// Unix millis plus a process-wide sequence, so two calls in the same
/// millisecond still differ.
fn cache_bust_token() -> String {
    let seq = CACHE_BUST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}{:04}", chrono::Utc::now().timestamp_millis(), seq % 10_000)
}

/// Turn a feed body into the canonical snapshot.
///
/// The body must be an object carrying a `links` or `adminLinks` array. The
/// first non-empty of the two is used. Every link is marked shared and gets
/// an id if it has none.
pub fn normalize_feed(endpoint: &str, body: Value) -> Result<FeedSnapshot, SyncError> {
    let Value::Object(mut object) = body else {
        return Err(SyncError::MalformedResponse(format!(
            "{}: expected a JSON object",
            endpoint
        )));
    };

    let links = take_array(&mut object, "links");
    let admin_links = take_array(&mut object, "adminLinks");
    if links.is_none() && admin_links.is_none() {
        return Err(SyncError::MalformedResponse(format!(
            "{}: no links or adminLinks array",
            endpoint
        )));
    }

    let raw = match (links, admin_links) {
        (Some(links), _) if !links.is_empty() => links,
        (_, Some(admin_links)) => admin_links,
        _ => Vec::new(),
    };

    let links = raw
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|value| serde_json::from_value::<Link>(value).ok())
        .map(|mut link| {
            link.is_shared = true;
            if link.id.is_empty() {
                link.id = generate_id("shared");
            }
            link
        })
        .collect();

    let categories = take_array(&mut object, "categories")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect();

    Ok(FeedSnapshot {
        endpoint: endpoint.to_string(),
        links,
        categories,
    })
}

fn take_array(object: &mut serde_json::Map<String, Value>, key: &str) -> Option<Vec<Value>> {
    match object.remove(key) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}
