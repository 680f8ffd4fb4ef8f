//! File name matching against the configured glob filter.

use glob::{MatchOptions, Pattern, PatternError};
use std::path::Path;

/// Shell semantics: `*` never crosses a separator, dot files are not special.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Match a single file name against a glob pattern.
pub fn matches(name: &str, pattern: &str) -> Result<bool, PatternError> {
    Ok(Pattern::new(pattern)?.matches_with(name, MATCH_OPTIONS))
}

/// A glob filter compiled once and applied to file names.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    pattern: Pattern,
}

impl FileMatcher {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.pattern.matches_with(name, MATCH_OPTIONS)
    }

    /// Match the final component of `path`; paths without one never match.
    pub fn matches_path(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.matches_name(&name.to_string_lossy()))
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        assert!(matches("core.txt", "*.txt").unwrap());
        assert!(matches(".hidden.txt", "*.txt").unwrap());
        assert!(!matches("core.txt.gz", "*.txt").unwrap());
        assert!(matches("dump-01.log", "dump-??.log").unwrap());
        assert!(matches("a.txt", "[abc].txt").unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches("core.txt", "[*.txt").is_err());
        assert!(FileMatcher::new("a[").is_err());
    }

    #[test]
    fn test_matcher_uses_file_name_only() {
        let matcher = FileMatcher::new("*.txt").unwrap();
        assert!(matcher.matches_path(Path::new("/dumps/app/nested/core.txt")));
        assert!(!matcher.matches_path(Path::new("/dumps/app.txt/core.bin")));
        assert!(!matcher.matches_path(Path::new("/")));
        assert!(!matcher.matches_name("dir/core.txt"));
    }
}
