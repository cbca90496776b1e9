use log::debug;
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32Str};

/// Anything the fuzzy filter can rank.
pub trait Rankable {
    /// Text the query is matched against.
    fn name(&self) -> &str;
    /// Stable identity, used for diagnostics.
    fn identity(&self) -> &str;
}

pub struct FuzzyMatcher {
    matcher: Matcher,
    min_score: u32,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORE)
    }
}

pub const DEFAULT_MIN_SCORE: u32 = 24;

impl FuzzyMatcher {
    pub fn new(min_score: u32) -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
            min_score,
        }
    }

    /// Rank `items` against `query`, best first.
    ///
    /// Matching is case-insensitive. Nucleo rewards matches at the start of the
    /// name and at word boundaries, and contiguous runs over scattered characters.
    /// Items below `min_score` are dropped. Equal scores keep their input order.
    /// An empty query returns `items` untouched. The query is matched as
    /// plain text, so `!`, `'`, `^` and `$` are ordinary characters.
    pub fn filter<T: Rankable>(&mut self, query: &str, items: Vec<T>) -> Vec<T> {
        if query.trim().is_empty() {
            return items;
        }

        let pattern = Pattern::new(
            query,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let mut buf = Vec::new();

        let mut scored: Vec<(u32, T)> = Vec::with_capacity(items.len());
        for item in items {
            let haystack = Utf32Str::new(item.name(), &mut buf);
            let Some(score) = pattern.score(haystack, &mut self.matcher) else {
                continue;
            };
            if score < self.min_score {
                debug!("below threshold: {} score={}", item.identity(), score);
                continue;
            }
            scored.push((score, item));
        }

        // `sort_by` is stable, so ties stay in input order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Named(&'static str, &'static str);

    impl Rankable for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn identity(&self) -> &str {
            self.1
        }
    }

    fn names(items: &[Named]) -> Vec<&'static str> {
        items.iter().map(|n| n.1).collect()
    }

    #[test]
    fn test_empty_query_is_noop() {
        let items = vec![Named("b", "1"), Named("a", "2"), Named("c", "3")];
        let mut matcher = FuzzyMatcher::default();
        assert_eq!(matcher.filter("", items.clone()), items);
        assert_eq!(matcher.filter("   ", items.clone()), items);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let items = vec![Named("Documents", "1"), Named("Downloads", "2")];
        let mut matcher = FuzzyMatcher::default();
        assert!(matcher.filter("xyz123notfound", items).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let items = vec![Named("Documents", "1")];
        let mut matcher = FuzzyMatcher::default();
        assert_eq!(names(&matcher.filter("DOCUMENTS", items)), vec!["1"]);
    }

    #[test]
    fn test_contiguous_prefix_beats_scattered() {
        let items = vec![
            Named("drop_old_cache", "scattered"),
            Named("Documents", "prefix"),
        ];
        let mut matcher = FuzzyMatcher::new(0);
        let ranked = matcher.filter("doc", items);
        assert_eq!(names(&ranked)[0], "prefix");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let items = vec![
            Named("Documents", "first"),
            Named("Documents", "second"),
            Named("Documents", "third"),
        ];
        let mut matcher = FuzzyMatcher::default();
        let ranked = matcher.filter("docu", items);
        assert_eq!(names(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_threshold_excludes() {
        let items = vec![Named("Documents", "1")];
        let mut matcher = FuzzyMatcher::new(u32::MAX);
        assert!(matcher.filter("doc", items).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let items = vec![
            Named("Desktop", "1"),
            Named("Documents", "2"),
            Named("dotfiles", "3"),
            Named("Downloads", "4"),
        ];
        let mut matcher = FuzzyMatcher::new(0);
        let first = matcher.filter("do", items.clone());
        let second = matcher.filter("do", items);
        assert_eq!(first, second);
    }

    #[test]
    fn test_query_punctuation_is_literal() {
        let items = vec![
            Named("!Important", "bang"),
            Named("Notes$", "dollar"),
            Named("c#", "hash"),
            Named("draft!", "draft"),
            Named("'quoted", "quote"),
            Named("Important", "plain"),
        ];
        let mut matcher = FuzzyMatcher::default();

        assert_eq!(names(&matcher.filter("!Import", items.clone())), vec!["bang"]);
        assert_eq!(names(&matcher.filter("Notes$", items.clone())), vec!["dollar"]);
        assert_eq!(names(&matcher.filter("'quo", items.clone())), vec!["quote"]);
        assert_eq!(names(&matcher.filter("^draft!", items.clone())), Vec::<&str>::new());
        assert_eq!(names(&matcher.filter("draft!", items)), vec!["draft"]);
    }
}
