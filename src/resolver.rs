//! Material token resolution.
//!
//! Upstream scene exporters routinely emit `usemtl` lines whose token is
//! empty or does not match any material in the mesh's material table. Those
//! defects are recovered locally: the resolver picks the known material
//! whose name is nearest by edit distance and logs the substitution so it
//! can be audited. The selection is advisory, never silently trusted.

use std::collections::BTreeSet;

use log::warn;

/// Resolves raw `usemtl` tokens to canonical material identifiers.
pub struct MaterialResolver {
    /// Known material names, sorted so nearest-match ties resolve
    /// deterministically to the lexicographically first name.
    known: BTreeSet<String>,
    /// Prefix applied to resolved identifiers to avoid cross-mesh
    /// collisions. Empty means no prefix.
    namespace: String,
    /// Key used when the token itself is empty, typically the mesh's own
    /// file stem.
    fallback_key: String,
}

impl MaterialResolver {
    pub fn new(
        known: impl IntoIterator<Item = String>,
        namespace: impl Into<String>,
        fallback_key: impl Into<String>,
    ) -> Self {
        Self {
            known: known.into_iter().collect(),
            namespace: namespace.into(),
            fallback_key: fallback_key.into(),
        }
    }

    /// Resolve a raw material token to a canonical identifier.
    pub fn resolve(&self, token: &str) -> String {
        if self.known.contains(token) {
            return self.qualify(token);
        }
        let query = if token.is_empty() {
            &self.fallback_key
        } else {
            token
        };
        match self.nearest(query) {
            Some(substitute) => {
                if token.is_empty() {
                    warn!(
                        "empty usemtl token: substituting {substitute:?} \
                         (nearest to fallback key {:?})",
                        self.fallback_key
                    );
                } else {
                    warn!("unknown material {token:?}: substituting {substitute:?}");
                }
                self.qualify(&substitute)
            }
            // No known materials to substitute from; pass the query through.
            None => {
                warn!("no known materials to resolve {token:?} against; using {query:?} as-is");
                self.qualify(query)
            }
        }
    }

    /// The known material nearest to `query` by edit distance.
    fn nearest(&self, query: &str) -> Option<String> {
        self.known
            .iter()
            .map(|name| (levenshtein(query, name), name))
            .min_by_key(|(dist, _)| *dist)
            .map(|(_, name)| name.clone())
    }

    fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.namespace, name)
        }
    }
}

/// Levenshtein edit distance between two strings.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row DP over the full matrix.
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(names: &[&str]) -> MaterialResolver {
        MaterialResolver::new(
            names.iter().map(|s| s.to_string()),
            "scene",
            "cornell_box",
        )
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "ab"), 1);
        assert_eq!(levenshtein("abc", "abcd"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn test_known_token_is_namespaced_unchanged() {
        let r = resolver(&["red", "green", "white"]);
        assert_eq!(r.resolve("red"), "scene:red");
    }

    #[test]
    fn test_empty_namespace_leaves_token_bare() {
        let r = MaterialResolver::new(vec!["red".to_string()], "", "box");
        assert_eq!(r.resolve("red"), "red");
    }

    #[test]
    fn test_unknown_token_picks_nearest() {
        let r = resolver(&["red", "green", "white"]);
        assert_eq!(r.resolve("gren"), "scene:green");
        assert_eq!(r.resolve("whitte"), "scene:white");
    }

    #[test]
    fn test_empty_token_matches_against_fallback_key() {
        let r = resolver(&["cornell_walls", "lamp", "glass"]);
        assert_eq!(r.resolve(""), "scene:cornell_walls");
    }

    #[test]
    fn test_fallback_is_deterministic_across_calls() {
        let r = resolver(&["aluminium", "aluminum"]);
        let first = r.resolve("aluminim");
        for _ in 0..10 {
            assert_eq!(r.resolve("aluminim"), first);
        }
    }

    #[test]
    fn test_tie_breaks_to_lexicographically_first() {
        // "ba" and "bc" are both distance 1 from "b".
        let r = MaterialResolver::new(
            vec!["bc".to_string(), "ba".to_string()],
            "",
            "key",
        );
        assert_eq!(r.resolve("b"), "ba");
    }

    #[test]
    fn test_empty_known_set_passes_through() {
        let r = MaterialResolver::new(Vec::new(), "scene", "mesh0");
        assert_eq!(r.resolve("anything"), "scene:anything");
        assert_eq!(r.resolve(""), "scene:mesh0");
    }
}
