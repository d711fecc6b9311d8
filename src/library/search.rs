//! Grouped library view and search.

use super::categories::{contains, extend_unique};
use super::state::LibraryState;
use super::types::{Link, FALLBACK_CATEGORY};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub name: String,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryView {
    pub categories: Vec<String>,
    pub groups: Vec<CategoryGroup>,
    pub total_links: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub groups: Vec<CategoryGroup>,
    pub total_matches: usize,
}

/// Every registry category with its links; user links come first.
///
/// An empty registry is replaced by `canonical`. Links whose category is
/// missing or unknown land in the fallback group.
pub fn build_view(state: &LibraryState, canonical: &[String]) -> LibraryView {
    let categories = display_registry(state, canonical);
    let groups = group_links(&categories, visible_links(state));
    let total_links = groups.iter().map(|g| g.links.len()).sum();

    LibraryView {
        categories,
        groups,
        total_links,
    }
}

/// Case-insensitive substring search over title, url, description and tags.
/// `category` of `None` or `"all"` searches every category. Only groups with
/// matches are returned.
pub fn search(
    state: &LibraryState,
    canonical: &[String],
    term: &str,
    category: Option<&str>,
) -> SearchResults {
    let needle = term.trim().to_lowercase();
    let filter = category.filter(|c| !c.is_empty() && *c != "all");
    let categories = display_registry(state, canonical);

    let matches = visible_links(state).filter(|link| {
        let in_category = filter.map_or(true, |f| placed_in(&categories, link) == f);
        in_category && (needle.is_empty() || matches_term(link, &needle))
    });

    let groups: Vec<CategoryGroup> = group_links(&categories, matches)
        .into_iter()
        .filter(|g| !g.links.is_empty())
        .collect();
    let total_matches = groups.iter().map(|g| g.links.len()).sum();

    SearchResults {
        term: term.to_string(),
        category: filter.map(str::to_string),
        groups,
        total_matches,
    }
}

fn display_registry(state: &LibraryState, canonical: &[String]) -> Vec<String> {
    let mut registry = if state.categories.is_empty() {
        canonical.to_vec()
    } else {
        state.categories.clone()
    };
    extend_unique(&mut registry, [FALLBACK_CATEGORY]);
    registry
}

/// User links, then the shared set: the admin mirror when it has content,
/// otherwise the shared collection.
fn visible_links(state: &LibraryState) -> impl Iterator<Item = &Link> {
    let shared = if state.admin_links.is_empty() {
        &state.links
    } else {
        &state.admin_links
    };
    state.user_links.iter().chain(shared.iter())
}

fn placed_in<'a>(registry: &[String], link: &'a Link) -> &'a str {
    let category = link.category_or_fallback();
    if contains(registry, category) {
        category
    } else {
        FALLBACK_CATEGORY
    }
}

fn group_links<'a>(
    registry: &[String],
    links: impl Iterator<Item = &'a Link>,
) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = registry
        .iter()
        .map(|name| CategoryGroup {
            name: name.clone(),
            links: Vec::new(),
        })
        .collect();

    for link in links {
        let target = placed_in(registry, link);
        if let Some(group) = groups.iter_mut().find(|g| g.name == target) {
            group.links.push(link.clone());
        }
    }
    groups
}

fn matches_term(link: &Link, needle: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(needle);
    link.title.as_deref().is_some_and(hit)
        || hit(&link.url)
        || link.description.as_deref().is_some_and(hit)
        || link.tags.iter().any(|tag| hit(tag))
}
