use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::WatchlistError;

/// Upper bound on the compiled size of a single pattern.
const FILTER_SIZE_LIMIT: usize = 1 << 20;

/// A user's filters, compiled once when the entry is loaded or changed.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    compiled: Vec<Regex>,
}

impl FilterSet {
    /// Compile every pattern, rejecting the whole set on the first bad one.
    pub fn compile(patterns: &[String]) -> Result<Self, WatchlistError> {
        let compiled = patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { compiled })
    }

    /// Compile what can be compiled. Used for entries already in the store,
    /// which must stay watched even if one of their patterns went bad.
    pub fn compile_lenient(patterns: &[String]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match compile_pattern(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping stored filter: {}", e);
                    None
                }
            })
            .collect();
        Self { compiled }
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// The first pattern found anywhere in `content`.
    pub fn first_match(&self, content: &str) -> Option<&str> {
        self.compiled
            .iter()
            .find(|re| re.is_match(content))
            .map(|re| re.as_str())
    }

    pub fn matches(&self, content: &str) -> bool {
        self.first_match(content).is_some()
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, WatchlistError> {
    if pattern.is_empty() {
        return Err(WatchlistError::BadFilter {
            pattern: pattern.to_string(),
            reason: "empty pattern matches every message".into(),
        });
    }

    RegexBuilder::new(pattern)
        .size_limit(FILTER_SIZE_LIMIT)
        .build()
        .map_err(|e| WatchlistError::BadFilter {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Check that every pattern compiles without keeping the result.
pub fn validate(patterns: &[String]) -> Result<(), WatchlistError> {
    patterns.iter().try_for_each(|p| compile_pattern(p).map(|_| ()))
}

/// New filters go first, followed by the existing ones. Duplicates are kept:
/// the filter count shown to moderators reflects every add.
pub fn merge_filters(existing: &[String], new: Vec<String>) -> Vec<String> {
    let mut merged = new;
    merged.extend_from_slice(existing);
    merged
}

/// Whether any pattern matches anywhere in `content`.
pub fn matches(content: &str, patterns: &FilterSet) -> bool {
    patterns.matches(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn word_boundary_filter() {
        let set = FilterSet::compile(&patterns(&[r"\bsus\b"])).unwrap();
        assert!(matches("that's sus honestly", &set));
        assert!(!matches("that's fine", &set));
        assert!(!matches("suspicious", &set));
    }

    #[test]
    fn matching_is_unanchored_and_case_sensitive() {
        let set = FilterSet::compile(&patterns(&["ot"])).unwrap();
        assert!(set.matches("hattyot was here"));
        assert!(!set.matches("HATTYOT"));
    }

    #[test]
    fn any_pattern_triggers_and_first_match_is_reported() {
        let set = FilterSet::compile(&patterns(&["alpha", "beta"])).unwrap();
        assert_eq!(set.first_match("beta then alpha"), Some("alpha"));
        assert_eq!(set.first_match("only beta"), Some("beta"));
        assert_eq!(set.first_match("gamma"), None);
    }

    #[test]
    fn empty_set_never_matches() {
        let set = FilterSet::compile(&[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.matches("anything"));
    }

    #[test]
    fn bad_pattern_is_rejected_by_name() {
        let err = FilterSet::compile(&patterns(&["fine", "(unclosed"])).unwrap_err();
        match err {
            WatchlistError::BadFilter { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected BadFilter, got {other:?}"),
        }
        assert!(validate(&patterns(&[""])).is_err());
        assert!(validate(&patterns(&[r"\ssus\s", "hattyot"])).is_ok());
    }

    #[test]
    fn lenient_compile_skips_bad_patterns() {
        let set = FilterSet::compile_lenient(&patterns(&["[", "ok"]));
        assert_eq!(set.len(), 1);
        assert!(set.matches("ok then"));
    }

    #[test]
    fn merge_prepends_new_and_keeps_duplicates() {
        let merged = merge_filters(&patterns(&["a", "b"]), patterns(&["c", "a"]));
        assert_eq!(merged, patterns(&["c", "a", "a", "b"]));
    }
}
