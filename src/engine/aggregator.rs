//! Merging, sorting and truncating provider contributions.
//!
//! Merge order is provider registration order, then the order in which
//! each provider emitted its entries. Sorting is stable on that order, so
//! entries with equal scores keep it.

use crate::models::Entry;
use std::collections::HashMap;

/// Scored entries from one provider task.
#[derive(Debug, Clone, Default)]
pub struct Contribution {
    /// Registration index of the provider.
    pub index: usize,
    pub entries: Vec<Entry>,
    /// At least one entry's own prefix matched the query.
    pub prefixed: bool,
}

/// How a merged round is finalized.
#[derive(Debug, Clone, Copy)]
pub struct Finalize {
    pub keep_sort: bool,
    pub text_is_empty: bool,
    pub max_entries: usize,
}

/// Concatenate contributions in registration order.
pub fn merge(mut contributions: Vec<Contribution>) -> (Vec<Entry>, bool) {
    contributions.sort_by_key(|c| c.index);
    let prefixed = contributions.iter().any(|c| c.prefixed);
    let entries = contributions.into_iter().flat_map(|c| c.entries).collect();
    (entries, prefixed)
}

/// Keep only entries carrying a per-entry prefix.
pub fn retain_prefixed(entries: &mut Vec<Entry>) {
    entries.retain(|entry| !entry.prefix.is_empty());
}

/// Sort by final score, highest first; ties keep merge order.
pub fn sort_by_score(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.score_final.total_cmp(&a.score_final));
}

/// Merge, narrow to prefixed entries if any matched, sort and truncate.
pub fn finalize(contributions: Vec<Contribution>, options: Finalize) -> Vec<Entry> {
    let (mut entries, prefixed) = merge(contributions);

    if prefixed {
        retain_prefixed(&mut entries);
    }

    if !options.keep_sort || !options.text_is_empty {
        sort_by_score(&mut entries);
    }

    entries.truncate(options.max_entries);
    entries
}

/// Count entries per provider.
pub fn group_by_provider(entries: &[Entry]) -> HashMap<String, usize> {
    let mut grouped: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        *grouped.entry(entry.provider.clone()).or_default() += 1;
    }

    grouped
}

/// Text summary of a published list, for logs.
pub fn summary_text(entries: &[Entry]) -> String {
    let mut providers: Vec<_> = group_by_provider(entries).into_iter().collect();
    providers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let parts: Vec<String> = providers
        .into_iter()
        .map(|(provider, count)| format!("{}: {}", provider, count))
        .collect();

    format!("{} entries ({})", entries.len(), parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, provider: &str, score: f64) -> Entry {
        let mut entry = Entry::new(label);
        entry.provider = provider.to_string();
        entry.score_final = score;
        entry
    }

    fn labels(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    fn options(max_entries: usize) -> Finalize {
        Finalize {
            keep_sort: false,
            text_is_empty: false,
            max_entries,
        }
    }

    #[test]
    fn test_merge_uses_registration_order() {
        let contributions = vec![
            Contribution {
                index: 2,
                entries: vec![entry("c", "runner", 1.0)],
                prefixed: false,
            },
            Contribution {
                index: 0,
                entries: vec![entry("a", "apps", 1.0), entry("b", "apps", 1.0)],
                prefixed: false,
            },
        ];

        let (merged, prefixed) = merge(contributions);
        assert_eq!(labels(&merged), vec!["a", "b", "c"]);
        assert!(!prefixed);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut entries = vec![
            entry("first", "apps", 5.0),
            entry("top", "apps", 9.0),
            entry("second", "apps", 5.0),
            entry("third", "apps", 5.0),
        ];

        sort_by_score(&mut entries);
        assert_eq!(labels(&entries), vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_finalize_truncates() {
        let contributions = vec![Contribution {
            index: 0,
            entries: (0..80).map(|i| entry(&i.to_string(), "apps", i as f64)).collect(),
            prefixed: false,
        }];

        let result = finalize(contributions, options(50));
        assert_eq!(result.len(), 50);
        assert_eq!(result[0].label, "79");
    }

    #[test]
    fn test_prefixed_entries_suppress_the_rest() {
        let contributions = vec![
            Contribution {
                index: 0,
                entries: vec![entry("Firefox", "apps", 500.0)],
                prefixed: false,
            },
            Contribution {
                index: 1,
                entries: vec![entry("Search the web", "websearch", 1.0).with_prefix("?")],
                prefixed: true,
            },
        ];

        let result = finalize(contributions, options(50));
        assert_eq!(labels(&result), vec!["Search the web"]);
    }

    #[test]
    fn test_keep_sort_only_on_empty_text() {
        let contributions = || {
            vec![Contribution {
                index: 0,
                entries: vec![entry("low", "apps", 1.0), entry("high", "apps", 2.0)],
                prefixed: false,
            }]
        };

        let kept = finalize(
            contributions(),
            Finalize {
                keep_sort: true,
                text_is_empty: true,
                max_entries: 50,
            },
        );
        assert_eq!(labels(&kept), vec!["low", "high"]);

        let sorted = finalize(
            contributions(),
            Finalize {
                keep_sort: true,
                text_is_empty: false,
                max_entries: 50,
            },
        );
        assert_eq!(labels(&sorted), vec!["high", "low"]);
    }

    #[test]
    fn test_summary_text() {
        let entries = vec![
            entry("a", "apps", 1.0),
            entry("b", "apps", 1.0),
            entry("c", "runner", 1.0),
        ];
        assert_eq!(summary_text(&entries), "3 entries (apps: 2, runner: 1)");
    }
}
