//! Hierarchical codename resolution.
//!
//! Codenames are dot-delimited paths such as `sites.detail.actions.test_meter`.
//! The server ships a flat map; the client resolves a query by exact match
//! first and then by walking proper prefixes from the most specific to the
//! least specific. Sibling keys are never consulted.

use crate::types::PermissionMap;

/// Iterator over the proper prefixes of a codename, most specific first.
///
/// `"a.b.c.d"` yields `"a.b.c"`, `"a.b"`, `"a"`. Empty segments are kept, so
/// `"a..b"` yields `"a."` then `"a"`.
#[derive(Debug, Clone)]
pub struct ProperPrefixes<'a> {
    remaining: &'a str,
}

impl<'a> Iterator for ProperPrefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let cut = self.remaining.rfind('.')?;
        self.remaining = &self.remaining[..cut];
        Some(self.remaining)
    }
}

/// Proper prefixes of `codename`, most specific first.
pub fn proper_prefixes(codename: &str) -> ProperPrefixes<'_> {
    ProperPrefixes { remaining: codename }
}

/// Resolve `codename` against `map`.
///
/// Returns `None` when neither the codename nor any proper prefix is present;
/// callers treat that as a denial.
pub fn resolve(map: &PermissionMap, codename: &str) -> Option<bool> {
    if let Some(granted) = map.get(codename) {
        return Some(*granted);
    }
    proper_prefixes(codename).find_map(|prefix| map.get(prefix).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(entries: &[(&str, bool)]) -> PermissionMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_prefixes_most_specific_first() {
        let prefixes: Vec<_> = proper_prefixes("a.b.c.d").collect();
        assert_eq!(prefixes, vec!["a.b.c", "a.b", "a"]);
    }

    #[test]
    fn test_prefixes_of_single_segment_is_empty() {
        assert_eq!(proper_prefixes("jobs").count(), 0);
        assert_eq!(proper_prefixes("").count(), 0);
    }

    #[test]
    fn test_prefixes_keep_empty_segments() {
        let prefixes: Vec<_> = proper_prefixes("a..b").collect();
        assert_eq!(prefixes, vec!["a.", "a"]);

        let prefixes: Vec<_> = proper_prefixes(".a").collect();
        assert_eq!(prefixes, vec![""]);

        let prefixes: Vec<_> = proper_prefixes("a.b.").collect();
        assert_eq!(prefixes, vec!["a.b", "a"]);
    }

    #[test]
    fn test_exact_match_wins_over_parent() {
        let m = map(&[("a.b", true), ("a.b.c", false)]);
        assert_eq!(resolve(&m, "a.b.c"), Some(false));

        let m = map(&[("a.b", false), ("a.b.c", true)]);
        assert_eq!(resolve(&m, "a.b.c"), Some(true));
    }

    #[test]
    fn test_parent_fallback() {
        let m = map(&[("a.b", true)]);
        assert_eq!(resolve(&m, "a.b.c"), Some(true));

        let m = map(&[("a", false)]);
        assert_eq!(resolve(&m, "a.b.c"), Some(false));
    }

    #[test]
    fn test_nearest_parent_wins() {
        let m = map(&[("a", true), ("a.b", false)]);
        assert_eq!(resolve(&m, "a.b.c.d"), Some(false));
    }

    #[test]
    fn test_siblings_are_not_consulted() {
        let m = map(&[("jobs.module.root", true), ("jobs.detail.edit", false)]);
        assert_eq!(resolve(&m, "jobs.unknown.action"), None);
        assert_eq!(resolve(&m, "jobs.detail.edit.title"), Some(false));
    }

    #[test]
    fn test_children_do_not_grant_parent() {
        let m = map(&[("a.b.c", true)]);
        assert_eq!(resolve(&m, "a.b"), None);
    }

    fn reference_resolve(map: &PermissionMap, codename: &str) -> Option<bool> {
        let parts: Vec<&str> = codename.split('.').collect();
        if let Some(v) = map.get(codename) {
            return Some(*v);
        }
        for i in (1..parts.len()).rev() {
            let parent = parts[..i].join(".");
            if let Some(v) = map.get(&parent) {
                return Some(*v);
            }
        }
        None
    }

    fn arb_codename() -> impl Strategy<Value = String> {
        prop::collection::vec(prop_oneof![Just(String::new()), "[a-c]{1,2}"], 1..5)
            .prop_map(|segments| segments.join("."))
    }

    proptest! {
        #[test]
        fn prop_resolve_matches_segment_join_model(
            entries in prop::collection::btree_map(arb_codename(), any::<bool>(), 0..12),
            codename in arb_codename(),
        ) {
            prop_assert_eq!(resolve(&entries, &codename), reference_resolve(&entries, &codename));
        }
    }
}
