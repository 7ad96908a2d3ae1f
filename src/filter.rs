//! Skip filter for excluding tests by name.

use regex::Regex;

/// The skip pattern did not compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid skip pattern {pattern:?}: {source}")]
pub struct InvalidPatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Decides whether a test is skipped based on its name.
#[derive(Debug, Clone, Default)]
pub struct SkipFilter {
    regex: Option<Regex>,
}

impl SkipFilter {
    /// Compile the filter. An empty or missing pattern never skips.
    pub fn new(pattern: Option<&str>) -> Result<Self, InvalidPatternError> {
        let regex = match pattern {
            None | Some("") => None,
            Some(p) => Some(Regex::new(p).map_err(|source| InvalidPatternError {
                pattern: p.to_string(),
                source,
            })?),
        };
        Ok(Self { regex })
    }

    /// Whether the pattern matches anywhere in the test name.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// Source of the compiled pattern, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_never_skips() {
        for filter in [SkipFilter::new(None).unwrap(), SkipFilter::new(Some("")).unwrap()] {
            assert!(!filter.matches("anything"));
            assert!(!filter.matches(""));
            assert_eq!(filter.pattern(), None);
        }
    }

    #[test]
    fn matches_substring_anywhere() {
        let filter = SkipFilter::new(Some("slow")).unwrap();
        assert!(filter.matches("very slow test"));
        assert!(filter.matches("slow"));
        assert!(!filter.matches("fast"));
        assert_eq!(filter.pattern(), Some("slow"));
    }

    #[test]
    fn alternation_and_anchors() {
        let filter = SkipFilter::new(Some("test-.*|.*-b")).unwrap();
        assert!(filter.matches("test-a"));
        assert!(filter.matches("suite-b"));
        assert!(!filter.matches("other"));

        let anchored = SkipFilter::new(Some("^exact$")).unwrap();
        assert!(anchored.matches("exact"));
        assert!(!anchored.matches("not exact"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = SkipFilter::new(Some("[invalid")).unwrap_err();
        assert_eq!(err.pattern, "[invalid");
        assert!(err.to_string().contains("invalid skip pattern"));
    }
}
