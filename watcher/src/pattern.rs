//! Composite path matcher built from regex and glob fragments.

use std::path::Path;

use globset::Glob;
use regex::bytes::Regex;

use crate::error::{Result, WatcherError};

/// Catch-all fragment used when no explicit pattern is given.
pub const DEFAULT_PATTERN: &str = ".*";

/// Immutable matcher over path strings.
///
/// All fragments are OR-ed together into a single regex. Matching works on
/// raw bytes so every path, UTF-8 or not, gets an answer.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
    fragments: Vec<String>,
}

impl PatternMatcher {
    /// Build a matcher from regex fragments and glob patterns.
    ///
    /// Regex fragments are used verbatim and come first, followed by the
    /// translated globs. A leading [`DEFAULT_PATTERN`] is dropped when
    /// anything else was supplied.
    pub fn build<R, G>(regexes: R, globs: G) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        G: IntoIterator,
        G::Item: AsRef<str>,
    {
        let mut fragments: Vec<String> = regexes
            .into_iter()
            .map(|r| r.as_ref().to_string())
            .collect();

        for glob in globs {
            fragments.push(compile_glob(glob.as_ref())?);
        }

        if fragments.len() > 1 && fragments[0] == DEFAULT_PATTERN {
            fragments.remove(0);
        }
        if fragments.is_empty() {
            fragments.push(DEFAULT_PATTERN.to_string());
        }

        let source = fragments
            .iter()
            .map(|f| format!("({f})"))
            .collect::<Vec<_>>()
            .join("|");

        let regex = Regex::new(&source).map_err(|e| WatcherError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { regex, fragments })
    }

    /// Check a path string.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path.as_bytes())
    }

    /// Check a path without requiring it to be valid UTF-8.
    pub fn matches_path(&self, path: &Path) -> bool {
        self.regex.is_match(path.as_os_str().as_encoded_bytes())
    }

    /// Fragments that make up the matcher, after default removal.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }
}

/// Translate a glob into regex source.
pub fn compile_glob(glob: &str) -> Result<String> {
    let compiled = Glob::new(glob).map_err(|e| WatcherError::InvalidPattern {
        pattern: glob.to_string(),
        reason: e.to_string(),
    })?;
    Ok(compiled.regex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_glob_set() {
        let matcher = PatternMatcher::build([DEFAULT_PATTERN], ["*.cpp", "*.h"]).unwrap();

        assert!(matcher.matches("foo.cpp"));
        assert!(matcher.matches("bar.h"));
        assert!(matcher.matches("src/nested/foo.cpp"));
        assert!(!matcher.matches("bar.hpp"));
        assert!(!matcher.matches("readme.md"));
    }

    #[test]
    fn test_default_matches_everything() {
        let matcher = PatternMatcher::build([DEFAULT_PATTERN], NONE).unwrap();

        assert!(matcher.matches(""));
        assert!(matcher.matches("anything/at/all.txt"));
        assert_eq!(matcher.fragments(), [DEFAULT_PATTERN]);
    }

    #[test]
    fn test_explicit_regex_drops_default() {
        let matcher = PatternMatcher::build([DEFAULT_PATTERN, r"\.rs$"], NONE).unwrap();

        assert_eq!(matcher.fragments(), [r"\.rs$"]);
        assert!(matcher.matches("src/lib.rs"));
        assert!(!matcher.matches("Cargo.toml"));
    }

    #[test]
    fn test_default_kept_when_not_first() {
        let matcher = PatternMatcher::build([r"\.rs$", DEFAULT_PATTERN], NONE).unwrap();

        assert_eq!(matcher.fragments().len(), 2);
        assert!(matcher.matches("Cargo.toml"));
    }

    #[test]
    fn test_empty_input_matches_everything() {
        let matcher = PatternMatcher::build(NONE, NONE).unwrap();
        assert!(matcher.matches("x"));
    }

    #[test]
    fn test_matches_is_total() {
        let matcher = PatternMatcher::build(NONE, ["*.txt"]).unwrap();

        for input in ["", "\n", "\u{0}", "ünïcödé.txt", "a\\b", "[*?]"] {
            let _ = matcher.matches(input);
        }
        assert!(matcher.matches("ünïcödé.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_matches_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let matcher = PatternMatcher::build(NONE, ["*.txt"]).unwrap();
        let path = Path::new(OsStr::from_bytes(b"caf\xe9.txt"));

        assert!(matcher.matches_path(path));
    }

    #[test]
    fn test_invalid_fragments() {
        assert!(matches!(
            PatternMatcher::build(["("], NONE),
            Err(WatcherError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PatternMatcher::build(NONE, ["a[b"]),
            Err(WatcherError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let a = PatternMatcher::build([DEFAULT_PATTERN, "^src/"], ["*.md"]).unwrap();
        let b = PatternMatcher::build([DEFAULT_PATTERN, "^src/"], ["*.md"]).unwrap();

        assert_eq!(a.fragments(), b.fragments());
        for input in ["src/main.rs", "README.md", "docs/x.md", "Cargo.toml", ""] {
            assert_eq!(a.matches(input), b.matches(input), "diverged on {input:?}");
        }
    }
}
