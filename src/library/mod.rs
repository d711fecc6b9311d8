pub mod categories;
pub mod defaults;
pub mod identity;
pub mod search;
pub mod state;
pub mod types;
pub mod user_links;

pub use categories::{reconcile_categories, with_link_categories};
pub use defaults::{BundledDefaults, DefaultsManifest, ManifestError};
pub use identity::Installation;
pub use search::{build_view, search, CategoryGroup, LibraryView, SearchResults};
pub use state::{keys, LibraryState, StateUpdate};
pub use types::{generate_id, normalize_url, now_iso, Link, LinkDraft, FALLBACK_CATEGORY};
pub use user_links::{
    add_category, add_user_link, clear_links, delete_link, export_data, import_data,
    update_user_link, ExportBundle, LibraryError, SavedLink,
};
