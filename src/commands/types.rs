use crate::config::Settings;
use crate::library::{ExportBundle, LibraryView, Link, LinkDraft, SearchResults};
use crate::sync::{ShareOutcome, SyncOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message from a UI surface: `{"action": "<name>", ...fields}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    ShareLink {
        #[serde(default)]
        link: Value,
    },
    ForceSync,
    ManualSync,
    ResetToDefaults,
    RefreshLinks,
    GetApiUrl,
    GetCurrentTab,
    AddLink {
        link: LinkDraft,
    },
    UpdateLink {
        id: String,
        link: LinkDraft,
    },
    DeleteLink {
        id: String,
    },
    AddCategory {
        name: String,
    },
    ClearLinks,
    ExportData,
    ImportData {
        data: Value,
    },
    GetLibrary,
    Search {
        #[serde(default)]
        term: String,
        #[serde(default)]
        category: Option<String>,
    },
    GetSettings,
    SaveSettings {
        settings: Settings,
    },
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::ShareLink { .. } => "shareLink",
            Request::ForceSync => "forceSync",
            Request::ManualSync => "manualSync",
            Request::ResetToDefaults => "resetToDefaults",
            Request::RefreshLinks => "refreshLinks",
            Request::GetApiUrl => "getApiUrl",
            Request::GetCurrentTab => "getCurrentTab",
            Request::AddLink { .. } => "addLink",
            Request::UpdateLink { .. } => "updateLink",
            Request::DeleteLink { .. } => "deleteLink",
            Request::AddCategory { .. } => "addCategory",
            Request::ClearLinks => "clearLinks",
            Request::ExportData => "exportData",
            Request::ImportData { .. } => "importData",
            Request::GetLibrary => "getLibrary",
            Request::Search { .. } => "search",
            Request::GetSettings => "getSettings",
            Request::SaveSettings { .. } => "saveSettings",
        }
    }
}

/// Reply to a [`Request`]. Every shape carries `success`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Sync(SyncOutcome),
    Share(ShareOutcome),
    ApiUrl {
        success: bool,
        url: String,
    },
    Tab {
        success: bool,
        #[serde(flatten)]
        tab: TabInfo,
    },
    Link {
        success: bool,
        link: Link,
    },
    Categories {
        success: bool,
        categories: Vec<String>,
    },
    Export {
        success: bool,
        data: ExportBundle,
    },
    Library {
        success: bool,
        #[serde(flatten)]
        view: LibraryView,
    },
    Search {
        success: bool,
        #[serde(flatten)]
        results: SearchResults,
    },
    Settings {
        success: bool,
        settings: Settings,
    },
    Ack {
        success: bool,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn ack() -> Self {
        Response::Ack { success: true }
    }

    pub fn failure(error: impl ToString) -> Self {
        Response::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Sync(outcome) => outcome.success,
            Response::Share(outcome) => outcome.success,
            Response::ApiUrl { success, .. }
            | Response::Tab { success, .. }
            | Response::Link { success, .. }
            | Response::Categories { success, .. }
            | Response::Export { success, .. }
            | Response::Library { success, .. }
            | Response::Search { success, .. }
            | Response::Settings { success, .. }
            | Response::Ack { success }
            | Response::Failure { success, .. } => *success,
        }
    }
}

/// The browser tab the user is looking at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub url: String,
    pub title: String,
}

/// Host browser hook for `getCurrentTab`.
#[async_trait]
pub trait TabProvider: Send + Sync {
    async fn current_tab(&self) -> Option<TabInfo>;
}
