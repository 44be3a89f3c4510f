use std::collections::HashSet;

use regex::Regex;

use super::entry::ArchiveEntry;
use crate::error::{Error, Result};

/// Policy deciding which entries are extracted and which are reported back.
pub trait Selection {
    type Item;

    /// Whether the entry is written to disk at all.
    fn attempt(&self, entry: &ArchiveEntry) -> bool;

    /// What to yield for an entry that was written, if anything.
    fn report(&self, entry: ArchiveEntry) -> Option<Self::Item>;
}

/// Extract everything, report paths in `targets` (or all with `full`).
#[derive(Debug, Clone, Default)]
pub struct TargetSelection {
    targets: HashSet<String>,
    full: bool,
}

impl TargetSelection {
    pub fn new<I, S>(targets: I, full: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            full,
        }
    }

    /// Report every extracted entry.
    pub fn full() -> Self {
        Self::new(std::iter::empty::<String>(), true)
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.full || self.targets.contains(path)
    }
}

impl Selection for TargetSelection {
    type Item = String;

    fn attempt(&self, _entry: &ArchiveEntry) -> bool {
        true
    }

    fn report(&self, entry: ArchiveEntry) -> Option<String> {
        self.is_selected(&entry.path).then_some(entry.path)
    }
}

/// Extract and report only entries whose path matches a pattern anchored at
/// the start of the path.
#[derive(Debug, Clone)]
pub struct PatternSelection {
    pattern: String,
    regex: Regex,
}

impl PatternSelection {
    /// Matches any non-empty path.
    pub const DEFAULT_PATTERN: &'static str = ".+?";

    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl Selection for PatternSelection {
    type Item = ArchiveEntry;

    fn attempt(&self, entry: &ArchiveEntry) -> bool {
        self.is_match(&entry.path)
    }

    fn report(&self, entry: ArchiveEntry) -> Option<ArchiveEntry> {
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_or_full() {
        let some = TargetSelection::new(["apps/a/_manifest"], false);
        assert!(some.is_selected("apps/a/_manifest"));
        assert!(!some.is_selected("apps/b/_manifest"));

        let all = TargetSelection::new(["ignored"], true);
        assert!(all.is_selected("anything"));
        assert!(TargetSelection::full().is_selected("x"));
        assert!(!TargetSelection::default().is_selected("x"));
    }

    #[test]
    fn pattern_is_anchored_at_start() {
        let sel = PatternSelection::new("assets/").unwrap();
        assert!(sel.is_match("assets/icon.png"));
        assert!(!sel.is_match("apps/x/assets/icon.png"));

        // Alternation stays anchored as a whole
        let sel = PatternSelection::new("a|b").unwrap();
        assert!(sel.is_match("b/c"));
        assert!(!sel.is_match("cb"));
    }

    #[test]
    fn explicit_caret_is_fine() {
        let sel = PatternSelection::new("^assets/").unwrap();
        assert!(sel.is_match("assets/x"));
        assert!(!sel.is_match("x/assets/x"));
    }

    #[test]
    fn default_pattern_matches_non_empty() {
        let sel = PatternSelection::new(PatternSelection::DEFAULT_PATTERN).unwrap();
        assert!(sel.is_match("a"));
        assert!(!sel.is_match(""));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = PatternSelection::new("(unclosed").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
