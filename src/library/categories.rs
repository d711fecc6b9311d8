//! Category registry.
//!
//! The registry is an ordered list of unique, case-sensitive names. It always
//! contains [`FALLBACK_CATEGORY`] and every category used by a persisted link.

use super::types::{Link, FALLBACK_CATEGORY};

/// Compute the working registry.
///
/// A non-empty `remote` list replaces `persisted`; otherwise `persisted` is
/// kept. Either way, `defaults` entries that are missing get appended in
/// their own order, then the fallback. Existing entries keep their position,
/// so feeding the output back in with no remote list returns it unchanged.
pub fn reconcile_categories(
    persisted: &[String],
    remote: &[String],
    defaults: &[String],
) -> Vec<String> {
    let base = if remote.iter().any(|c| !c.is_empty()) {
        remote
    } else {
        persisted
    };

    let mut registry = Vec::with_capacity(base.len() + defaults.len() + 1);
    extend_unique(&mut registry, base.iter().map(String::as_str));
    extend_unique(&mut registry, defaults.iter().map(String::as_str));
    extend_unique(&mut registry, [FALLBACK_CATEGORY]);
    registry
}

/// Append names not yet present, skipping empty strings.
pub fn extend_unique<'a>(registry: &mut Vec<String>, names: impl IntoIterator<Item = &'a str>) {
    for name in names {
        if !name.is_empty() && !registry.iter().any(|existing| existing == name) {
            registry.push(name.to_string());
        }
    }
}

/// Extend the registry with every category a persisted link uses, shared
/// links first.
pub fn with_link_categories(mut registry: Vec<String>, shared: &[Link], user: &[Link]) -> Vec<String> {
    extend_unique(
        &mut registry,
        shared
            .iter()
            .chain(user)
            .filter_map(|link| link.category.as_deref()),
    );
    registry
}

/// Does the registry know this category?
pub fn contains(registry: &[String], name: &str) -> bool {
    registry.iter().any(|c| c == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_remote_replaces_persisted() {
        let result = reconcile_categories(
            &names(&["Old", "Maps"]),
            &names(&["X", "Maps"]),
            &[],
        );
        assert_eq!(result, names(&["X", "Maps", "Other"]));
    }

    #[test]
    fn test_empty_remote_keeps_persisted_and_adds_defaults() {
        let result = reconcile_categories(
            &names(&["Maps", "Custom"]),
            &[],
            &names(&["2D", "Maps", "Other", "3D"]),
        );
        assert_eq!(result, names(&["Maps", "Custom", "2D", "Other", "3D"]));
    }

    #[test]
    fn test_fallback_always_present() {
        assert_eq!(reconcile_categories(&[], &[], &[]), names(&["Other"]));

        let result = reconcile_categories(&names(&["Other", "A"]), &[], &[]);
        assert_eq!(result, names(&["Other", "A"]));
    }

    #[test]
    fn test_duplicates_and_empty_names_dropped() {
        let result = reconcile_categories(&[], &names(&["A", "", "A", "a"]), &[]);
        assert_eq!(result, names(&["A", "a", "Other"]));
    }

    #[test]
    fn test_remote_of_only_empty_strings_counts_as_empty() {
        let result = reconcile_categories(&names(&["Keep"]), &names(&[""]), &[]);
        assert_eq!(result, names(&["Keep", "Other"]));
    }

    #[test]
    fn test_idempotent_over_sample_inputs() {
        let cases: Vec<(Vec<String>, Vec<String>, Vec<String>)> = vec![
            (vec![], vec![], vec![]),
            (names(&["A"]), vec![], names(&["B", "Other"])),
            (names(&["A", "B"]), names(&["C"]), names(&["B", "D"])),
            (names(&["Other"]), names(&["X", "X"]), vec![]),
            (names(&["z", "Z"]), vec![], names(&["Z", "y"])),
        ];

        for (persisted, remote, defaults) in cases {
            let once = reconcile_categories(&persisted, &remote, &defaults);
            let twice = reconcile_categories(&once, &[], &defaults);
            assert_eq!(once, twice, "not idempotent for {:?} {:?} {:?}", persisted, remote, defaults);
        }
    }

    #[test]
    fn test_extend_unique_preserves_order() {
        let mut registry = names(&["A"]);
        extend_unique(&mut registry, ["C", "A", "B", "C"]);
        assert_eq!(registry, names(&["A", "C", "B"]));
        assert!(contains(&registry, "B"));
        assert!(!contains(&registry, "b"));
    }

    #[test]
    fn test_link_categories_appended_in_first_seen_order() {
        let link = |category: Option<&str>| Link {
            category: category.map(str::to_string),
            ..Link::default()
        };
        let shared = vec![link(Some("Maps")), link(None), link(Some("AI"))];
        let user = vec![link(Some("Maps")), link(Some("Tools")), link(Some(""))];

        let registry = with_link_categories(names(&["Other", "AI"]), &shared, &user);
        assert_eq!(registry, names(&["Other", "AI", "Maps", "Tools"]));
    }
}
