//! Analyzer scope matching
//!
//! Decides whether a project-relative path is one the analyzer is
//! configured to check. The rules come from a scope document (see
//! [`loader`]); this module only deals with the already-extracted patterns.

pub mod loader;

pub use loader::{ScopeConfigLoader, XmlScopeLoader, SCOPE_XMLNS};

/// Canonical separator used for every stored pattern and queried path
const SEPARATOR: char = '/';

/// Map both `/` and `\` to the canonical separator
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// A group of directory-prefix and exact-file patterns
///
/// Patterns are stored normalized. A set without patterns matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    directories: Vec<String>,
    files: Vec<String>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory pattern; everything below it matches
    pub fn with_directory(mut self, name: &str) -> Self {
        self.add_directory(name);
        self
    }

    /// Add an exact-file pattern
    pub fn with_file(mut self, name: &str) -> Self {
        self.add_file(name);
        self
    }

    pub fn add_directory(&mut self, name: &str) {
        let mut prefix = normalize_path(name);
        prefix.push(SEPARATOR);
        self.directories.push(prefix);
    }

    pub fn add_file(&mut self, name: &str) {
        self.files.push(normalize_path(name));
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Match an already-normalized path
    ///
    /// Directory patterns only match at a segment boundary, so `test/Foo`
    /// covers `test/Foo/Bar.php` but not `test/Foos/Bar.php`.
    fn matches(&self, normalized_path: &str) -> bool {
        self.directories
            .iter()
            .any(|prefix| normalized_path.starts_with(prefix.as_str()))
            || self.files.iter().any(|file| file == normalized_path)
    }
}

/// An inclusion file set together with the exclusions nested under it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionBlock {
    pub include: FileSet,
    pub exclude: Vec<FileSet>,
}

impl InclusionBlock {
    pub fn new(include: FileSet) -> Self {
        Self {
            include,
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, exclude: FileSet) -> Self {
        self.exclude.push(exclude);
        self
    }
}

/// Which project files the analyzer is configured to check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeConfig {
    /// No scope document exists; every path is in scope
    Missing,
    /// Inclusion blocks in document order
    Declared(Vec<InclusionBlock>),
}

impl ScopeConfig {
    /// Check whether `relative_path` belongs to the configured scope
    ///
    /// The first inclusion block that matches decides: the path is in scope
    /// unless one of that block's exclusions also matches it.
    pub fn belongs_to_scope(&self, relative_path: &str) -> bool {
        let blocks = match self {
            ScopeConfig::Missing => return true,
            ScopeConfig::Declared(blocks) => blocks,
        };

        let path = normalize_path(relative_path);
        match blocks.iter().find(|block| block.include.matches(&path)) {
            Some(block) => !block.exclude.iter().any(|set| set.matches(&path)),
            None => false,
        }
    }

    /// Keep the paths that are in scope, preserving their order
    pub fn filter<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        paths
            .into_iter()
            .filter(|path| {
                let in_scope = self.belongs_to_scope(path);
                tracing::debug!(path = %path, in_scope, "scope decision");
                in_scope
            })
            .cloned()
            .collect()
    }
}
