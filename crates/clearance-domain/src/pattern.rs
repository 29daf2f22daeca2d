//! Glob patterns matched against file-tree paths
//!
//! Used by bulk conclusions and path exclusions. `*` and `?` never cross a
//! `/`, `**` spans any number of segments, `{a,b}` and `[...]` work as in
//! shell globs.

use std::fmt;

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::errors::{DomainError, DomainResult};

/// A compiled path pattern
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    matcher: GlobMatcher,
}

impl PathPattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> DomainResult<Self> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(DomainError::validation("pattern", "pattern cannot be empty"));
        }
        if source.starts_with('/') {
            return Err(DomainError::validation(
                "pattern",
                "pattern must be relative to the package root",
            ));
        }

        let glob: Glob = GlobBuilder::new(source)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| DomainError::validation("pattern", e.kind().to_string()))?;

        Ok(Self {
            source: source.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Check a pattern without keeping the compiled form
    pub fn validate(pattern: &str) -> DomainResult<()> {
        Self::new(pattern).map(|_| ())
    }

    /// Pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether a file-tree path matches
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path.trim_start_matches('/'))
    }

    /// Paths from `paths` that match, in input order
    pub fn filter<'a, I>(&self, paths: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths.into_iter().filter(|path| self.is_match(path)).collect()
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
