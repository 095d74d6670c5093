//! Path exclusion for archive operations.
//!
//! Exclusion entries are folder names or relative paths. Matching is exact
//! per path segment and case-insensitive; there are no wildcards.
//!
//! - A single-segment entry (`Logs`) excludes any path with a segment equal
//!   to it, at any depth, together with everything underneath.
//! - A multi-segment entry (`Cache/PhotoTranscoder`) is anchored at the
//!   source root and excludes that path and everything underneath.

use std::path::{Component, Path};

/// Immutable set of exclusion entries for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    /// Lowercased single-segment names
    names: Vec<String>,
    /// Lowercased multi-segment prefixes
    prefixes: Vec<Vec<String>>,
}

impl ExclusionSet {
    /// Builds a set from configured entries. Blank entries are ignored.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for entry in entries {
            let segments = segments(entry.as_ref());
            match segments.len() {
                0 => {}
                1 => {
                    if !set.names.contains(&segments[0]) {
                        set.names.extend(segments);
                    }
                }
                _ => {
                    if !set.prefixes.contains(&segments) {
                        set.prefixes.push(segments);
                    }
                }
            }
        }
        set
    }

    /// Adds `path` as an entry anchored at the source root, even when it is
    /// a single segment
    pub fn with_anchored(mut self, path: &str) -> Self {
        let segments = segments(path);
        if !segments.is_empty() && !self.prefixes.contains(&segments) {
            self.prefixes.push(segments);
        }
        self
    }

    /// An empty set, which includes everything
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prefixes.is_empty()
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.names.len() + self.prefixes.len()
    }

    fn excludes(&self, path: &[String]) -> bool {
        path.iter().any(|segment| self.names.contains(segment))
            || self
                .prefixes
                .iter()
                .any(|prefix| path.len() >= prefix.len() && path[..prefix.len()] == prefix[..])
    }
}

/// Inclusion predicate over paths relative to the source root.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    exclusions: ExclusionSet,
}

impl PathFilter {
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self { exclusions }
    }

    /// A filter that includes every path
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Whether `relative_path` belongs in the archive.
    ///
    /// Backslashes are treated as separators. The empty path, `.`, and `/`
    /// denote the source root, which is always included.
    pub fn should_include(&self, relative_path: &str) -> bool {
        if self.exclusions.is_empty() {
            return true;
        }
        let path = segments(relative_path);
        path.is_empty() || !self.exclusions.excludes(&path)
    }

    /// `should_include` for a native relative path
    pub fn should_include_path(&self, relative_path: &Path) -> bool {
        if self.exclusions.is_empty() {
            return true;
        }
        let path: Vec<String> = relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .collect();
        path.is_empty() || !self.exclusions.excludes(&path)
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_lowercase)
        .collect()
}
