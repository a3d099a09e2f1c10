//! Remote paths written during a run.

/// Insertion-ordered, de-duplicated set of remote paths created by
/// copy-to-remote events.
///
/// The set is owned by a single runner; nothing is shared between runners.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CopiedPaths {
    paths: Vec<String>,
}

impl CopiedPaths {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { paths: Vec::new() }
    }

    /// Records `path`. Returns `false` when it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let candidate = path.into();
        if self.contains(&candidate) {
            return false;
        }
        self.paths.push(candidate);
        true
    }

    /// Returns `true` when `path` has been recorded.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|existing| existing == path)
    }

    /// Number of recorded paths.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over the paths in the order they were first recorded.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Forgets `path`. Returns `false` when it was not recorded.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.paths.len();
        self.paths.retain(|existing| existing != path);
        self.paths.len() != before
    }

    /// Forgets every recorded path.
    pub fn clear(&mut self) {
        self.paths.clear();
    }
}
