//! Bundled defaults manifest: the admin links and canonical categories used
//! on first run, on reset, and whenever the remote feed is unreachable and
//! nothing is cached.

use super::state::{decode_links, decode_strings};
use super::types::Link;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

const EMBEDDED_MANIFEST: &str = include_str!("../../assets/default_links.json");

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultsManifest {
    pub admin_links: Vec<Link>,
    pub categories: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read defaults manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Defaults manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid defaults manifest format: {0}")]
    Format(String),
}

impl DefaultsManifest {
    /// Parse `{ adminLinks: Link[], categories?: string[] }`.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(object) = value else {
            return Err(ManifestError::Format("expected a JSON object".into()));
        };

        if !object.get("adminLinks").is_some_and(Value::is_array) {
            return Err(ManifestError::Format("missing adminLinks array".into()));
        }

        let items: HashMap<String, Value> = object.into_iter().collect();
        Ok(Self {
            admin_links: decode_links(&items, "adminLinks"),
            categories: decode_strings(&items, "categories"),
        })
    }

    /// The manifest compiled into the binary.
    pub fn embedded() -> Result<Self, ManifestError> {
        Self::parse(EMBEDDED_MANIFEST)
    }
}

/// Source of the defaults manifest, optionally overridden by a file on disk.
#[derive(Debug, Clone, Default)]
pub struct BundledDefaults {
    override_path: Option<PathBuf>,
}

impl BundledDefaults {
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self { override_path }
    }

    /// Load the manifest. An override that cannot be read or parsed, or that
    /// lists no admin links, falls back to the embedded manifest; an override
    /// without categories borrows the embedded list.
    pub async fn load(&self) -> Result<DefaultsManifest, ManifestError> {
        let embedded = DefaultsManifest::embedded()?;

        let Some(path) = &self.override_path else {
            return Ok(embedded);
        };

        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(text) => DefaultsManifest::parse(&text).and_then(|manifest| {
                if manifest.admin_links.is_empty() {
                    Err(ManifestError::Format("adminLinks is empty".into()))
                } else {
                    Ok(manifest)
                }
            }),
            Err(e) => Err(ManifestError::Io(e)),
        };

        match loaded {
            Ok(mut manifest) => {
                if manifest.categories.is_empty() {
                    manifest.categories = embedded.categories;
                }
                tracing::debug!(
                    "Loaded defaults from {}: {} links, {} categories",
                    path.display(),
                    manifest.admin_links.len(),
                    manifest.categories.len()
                );
                Ok(manifest)
            }
            Err(e) => {
                tracing::warn!(
                    "Defaults override {} unusable ({}), using embedded manifest",
                    path.display(),
                    e
                );
                Ok(embedded)
            }
        }
    }
}
