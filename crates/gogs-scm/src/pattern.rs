//! Branch include/exclude wildcards.
//!
//! Patterns are space-separated expressions where `*` matches any
//! substring and every other character is literal. `branch*` matches
//! `branch1` and `branch-x`; `*` matches everything.

use regex::Regex;

use crate::error::ConfigError;

/// Default include expression, matching every branch.
pub const DEFAULT_INCLUDES: &str = "*";

/// Default exclude expression, excluding nothing.
pub const DEFAULT_EXCLUDES: &str = "";

/// Compile a wildcard list into an anchored regular expression.
///
/// Returns `None` for a blank list, which matches no name.
pub fn compile_wildcards(wildcards: &str) -> Result<Option<Regex>, ConfigError> {
    let alternatives: Vec<String> = wildcards
        .split_whitespace()
        .map(|wildcard| {
            wildcard
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        })
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!("^(?:{})$", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: wildcards.to_string(),
            source,
        })
}

/// Compiled include/exclude pair for one source.
#[derive(Debug, Clone)]
pub struct BranchFilter {
    includes: String,
    excludes: String,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl BranchFilter {
    /// Compile both expressions, failing on the first invalid one.
    pub fn new(includes: &str, excludes: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            includes: includes.to_string(),
            excludes: excludes.to_string(),
            include: compile_wildcards(includes)?,
            exclude: compile_wildcards(excludes)?,
        })
    }

    #[must_use]
    pub fn includes(&self) -> &str {
        &self.includes
    }

    #[must_use]
    pub fn excludes(&self) -> &str {
        &self.excludes
    }

    /// Whether `branch` is rejected by this filter.
    ///
    /// A branch is excluded when it matches the exclude list or does not
    /// match the include list.
    #[must_use]
    pub fn is_excluded(&self, branch: &str) -> bool {
        let included = self.include.as_ref().is_some_and(|re| re.is_match(branch));
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(branch));
        excluded || !included
    }

    #[must_use]
    pub fn matches(&self, branch: &str) -> bool {
        !self.is_excluded(branch)
    }
}

impl Default for BranchFilter {
    fn default() -> Self {
        Self {
            includes: DEFAULT_INCLUDES.to_string(),
            excludes: DEFAULT_EXCLUDES.to_string(),
            include: Regex::new("^(?:.*)$").ok(),
            exclude: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        let filter = BranchFilter::new("*", "").unwrap();
        for name in ["main", "feature/x", "", "a b", "release-1.0"] {
            assert!(filter.matches(name), "{name} should match");
        }
    }

    #[test]
    fn test_default_filter_equals_compiled_defaults() {
        let filter = BranchFilter::default();
        assert_eq!(filter.includes(), "*");
        assert_eq!(filter.excludes(), "");
        assert!(filter.matches("anything/at/all"));
    }

    #[test]
    fn test_prefix_wildcard() {
        let filter = BranchFilter::new("branch*", "").unwrap();
        assert!(filter.matches("branch1"));
        assert!(filter.matches("branch"));
        assert!(!filter.matches("mybranch"));
        assert!(!filter.matches("main"));
    }

    #[test]
    fn test_literal_tokens_are_exact() {
        let filter = BranchFilter::new("main dev", "").unwrap();
        assert!(filter.matches("main"));
        assert!(filter.matches("dev"));
        assert!(!filter.matches("main2"));
        assert!(!filter.matches("develop"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let filter = BranchFilter::new("release-1.0 fix+(x)", "").unwrap();
        assert!(filter.matches("release-1.0"));
        assert!(!filter.matches("release-1x0"));
        assert!(filter.matches("fix+(x)"));
    }

    #[test]
    fn test_excludes_win_over_includes() {
        let filter = BranchFilter::new("*", "wip/* *-tmp").unwrap();
        assert!(filter.matches("main"));
        assert!(filter.is_excluded("wip/thing"));
        assert!(filter.is_excluded("scratch-tmp"));
        assert!(filter.matches("tmp-scratch"));
    }

    #[test]
    fn test_inner_wildcard() {
        let filter = BranchFilter::new("feature/*/done", "").unwrap();
        assert!(filter.matches("feature/abc/done"));
        assert!(filter.matches("feature//done"));
        assert!(!filter.matches("feature/abc/todo"));
    }

    #[test]
    fn test_blank_includes_match_nothing() {
        let filter = BranchFilter::new("  ", "").unwrap();
        assert!(filter.is_excluded("main"));
    }

    #[test]
    fn test_extra_spaces_are_ignored() {
        let filter = BranchFilter::new("  main   dev ", "").unwrap();
        assert!(filter.matches("main"));
        assert!(filter.matches("dev"));
        assert!(!filter.matches(""));
    }
}
