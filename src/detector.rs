//! Change detection: time-window cutoff, de-duplication and keyword matching.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};

use crate::models::Timestamped;

/// `now - window_hours`. Negative windows are clamped to zero; windows
/// reaching past the representable range select everything.
pub fn cutoff(now: DateTime<Utc>, window_hours: i64) -> DateTime<Utc> {
    Duration::try_hours(window_hours.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Inclusive: an item created exactly at the cutoff is new.
pub fn is_new(created_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    created_at >= cutoff
}

/// Keep items created at or after `cutoff`, dropping repeated IDs.
///
/// Input order is preserved and the first occurrence of an ID wins.
pub fn select_new<T: Timestamped>(items: impl IntoIterator<Item = T>, cutoff: DateTime<Utc>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| is_new(item.created_at(), cutoff))
        .filter(|item| seen.insert(item.item_id().to_string()))
        .collect()
}

/// Most recent first; ties broken by ID so output is stable.
pub fn sort_newest_first<T: Timestamped>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.item_id().cmp(b.item_id()))
    });
}

/// Case-insensitive, word-bounded keyword matcher for announcement text.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    patterns: Vec<(String, Regex)>,
}

impl KeywordFilter {
    /// Blank keywords are ignored. Whitespace inside a phrase matches any run
    /// of whitespace.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let patterns = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .filter_map(|keyword| {
                let body = keyword
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                let word_edge = |c: Option<char>| {
                    if c.is_some_and(|c| c.is_alphanumeric() || c == '_') {
                        r"\b"
                    } else {
                        ""
                    }
                };
                let pattern = format!(
                    "{}{}{}",
                    word_edge(keyword.chars().next()),
                    body,
                    word_edge(keyword.chars().last())
                );
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (keyword.to_string(), re))
            })
            .collect();
        Self { patterns }
    }

    /// Keywords found in `text`, in configured order.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(keyword, _)| keyword.as_str())
            .collect()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Item {
        id: &'static str,
        at: DateTime<Utc>,
    }

    impl Timestamped for Item {
        fn item_id(&self) -> &str {
            self.id
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cutoff_saturates_on_huge_windows() {
        assert_eq!(cutoff(now(), 24), now() - Duration::hours(24));
        assert_eq!(cutoff(now(), -5), now());
        assert_eq!(cutoff(now(), 10_000_000_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(cutoff(now(), i64::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_window_example() {
        let now = now();
        let items = vec![
            Item { id: "1h", at: now - Duration::hours(1) },
            Item { id: "25h", at: now - Duration::hours(25) },
            Item { id: "24h", at: now - Duration::hours(24) },
        ];

        let ids: Vec<_> = select_new(items, cutoff(now, 24)).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["1h", "24h"]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let c = cutoff(now(), 6);
        assert!(is_new(c, c));
        assert!(!is_new(c - Duration::seconds(1), c));
    }

    #[test]
    fn test_duplicates_dropped() {
        let now = now();
        let items = vec![
            Item { id: "a", at: now },
            Item { id: "a", at: now - Duration::minutes(5) },
            Item { id: "b", at: now },
        ];
        assert_eq!(select_new(items, cutoff(now, 1)).len(), 2);
    }

    #[test]
    fn test_sort_newest_first_ties_by_id() {
        let now = now();
        let mut items = vec![
            Item { id: "b", at: now },
            Item { id: "old", at: now - Duration::hours(3) },
            Item { id: "a", at: now },
        ];
        sort_newest_first(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "old"]);
    }

    #[test]
    fn test_keyword_word_boundaries() {
        let filter = KeywordFilter::new(&["project", "lab test"]);
        assert!(!filter.is_match("Bring the projector tomorrow"));
        assert!(filter.is_match("Final PROJECT review on Monday"));
        assert_eq!(filter.matches("LAB   TEST next week"), vec!["lab test"]);
    }

    #[test]
    fn test_keyword_special_characters() {
        let filter = KeywordFilter::new(&["c++", "  ", "mini project"]);
        assert!(!filter.is_empty());
        assert!(filter.is_match("Mini\nproject groups are out"));
    }
}
