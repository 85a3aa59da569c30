//! Union of known and newly discovered bundles.

use super::BundleKey;
use serde::Serialize;
use std::collections::HashSet;

/// Merge output: the minimum the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeEntry {
    pub slug: String,
    pub id: Option<i64>,
}

impl BundleKey for MergeEntry {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn id(&self) -> Option<i64> {
        self.id
    }
}

/// Known bundles first, in their order, then scraped bundles with unseen slugs.
///
/// The first occurrence of a slug wins, so a known bundle keeps its id even
/// when the scrape found it again without one. Empty slugs are dropped.
pub fn merge<E: BundleKey, C: BundleKey>(existing: &[E], scraped: &[C]) -> Vec<MergeEntry> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + scraped.len());

    let known = existing.iter().map(|e| (e.slug(), e.id()));
    let fresh = scraped.iter().map(|c| (c.slug(), c.id()));

    let mut added = 0usize;
    for (i, (slug, id)) in known.chain(fresh).enumerate() {
        if slug.is_empty() || !seen.insert(slug) {
            continue;
        }
        if i >= existing.len() {
            added += 1;
        }
        merged.push(MergeEntry {
            slug: slug.to_string(),
            id,
        });
    }

    tracing::info!(
        "merged {} known + {} new bundles ({} scraped)",
        merged.len() - added,
        added,
        scraped.len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Candidate;

    fn known(slug: &str, id: Option<i64>) -> MergeEntry {
        MergeEntry {
            slug: slug.to_string(),
            id,
        }
    }

    fn scraped(slug: &str, id: Option<i64>) -> Candidate {
        Candidate {
            slug: slug.to_string(),
            name: slug.to_string(),
            id,
            source_url: format!("https://www.curseforge.com/minecraft/modpacks/{slug}"),
        }
    }

    fn slugs(entries: &[MergeEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.slug.as_str()).collect()
    }

    #[test]
    fn test_merge_keeps_known_order_and_appends_new() {
        let existing = vec![known("a", Some(11111)), known("b", Some(22222))];
        let found = vec![scraped("b", None), scraped("c", Some(33333))];

        let merged = merge(&existing, &found);
        assert_eq!(slugs(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged[1].id, Some(22222));
        assert_eq!(merged[2].id, Some(33333));
    }

    #[test]
    fn test_merge_skips_empty_and_duplicate_slugs() {
        let existing = vec![known("", Some(1)), known("x", None), known("x", Some(5))];
        let found = vec![scraped("", None), scraped("y", None), scraped("y", Some(9))];

        let merged = merge(&existing, &found);
        assert_eq!(slugs(&merged), vec!["x", "y"]);
        assert_eq!(merged[0].id, None);
        assert_eq!(merged[1].id, None);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let existing = vec![known("m", None), known("n", Some(44444))];
        let found = vec![scraped("o", None), scraped("m", Some(55555)), scraped("p", None)];

        let first = merge(&existing, &found);
        let second = merge(&existing, &found);
        assert_eq!(first, second);
        assert_eq!(slugs(&first), vec!["m", "n", "o", "p"]);
    }

    #[test]
    fn test_merge_with_nothing_known() {
        let merged = merge::<MergeEntry, _>(&[], &[scraped("only", None)]);
        assert_eq!(slugs(&merged), vec!["only"]);
    }
}
