//! Scope document loading
//!
//! Reads the analyzer's XML scope document and extracts the inclusion and
//! exclusion patterns. Only `projectFiles` blocks and the `directory`,
//! `file` and `ignoreFiles` elements inside them are understood; the rest
//! of the analyzer's configuration schema is ignored.

use super::{FileSet, InclusionBlock, ScopeConfig};
use crate::errors::ScopeConfigError;
use std::path::{Path, PathBuf};

/// Namespace every recognized element must be declared in
pub const SCOPE_XMLNS: &str = "https://getpsalm.org/schema/config";

/// Default scope document names, tried in order
pub const DEFAULT_CONFIG_FILES: &[&str] = &["scope.xml", "scope.xml.dist"];

/// Source of the scope configuration for a project
pub trait ScopeConfigLoader: Send + Sync {
    fn load_for_project(&self, project_root: &Path) -> Result<ScopeConfig, ScopeConfigError>;
}

/// Loads the first scope document that exists under the project root
#[derive(Debug, Clone)]
pub struct XmlScopeLoader {
    config_files: Vec<String>,
}

impl Default for XmlScopeLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILES.iter().map(|s| s.to_string()).collect())
    }
}

impl XmlScopeLoader {
    pub fn new(config_files: Vec<String>) -> Self {
        Self { config_files }
    }

    /// First candidate that exists as a file, if any
    pub fn locate(&self, project_root: &Path) -> Option<PathBuf> {
        self.config_files
            .iter()
            .map(|name| project_root.join(name))
            .find(|path| path.is_file())
    }
}

impl ScopeConfigLoader for XmlScopeLoader {
    fn load_for_project(&self, project_root: &Path) -> Result<ScopeConfig, ScopeConfigError> {
        let Some(path) = self.locate(project_root) else {
            tracing::debug!(
                "No scope document in {:?}, every file is in scope",
                project_root
            );
            return Ok(ScopeConfig::Missing);
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ScopeConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = parse_document(&content).map_err(|e| ScopeConfigError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if let ScopeConfig::Declared(blocks) = &config {
            tracing::info!(
                "Loaded scope document {:?} with {} inclusion block(s)",
                path,
                blocks.len()
            );
        }
        Ok(config)
    }
}

/// Parse a scope document into its inclusion blocks
pub fn parse_document(content: &str) -> Result<ScopeConfig, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(content, options)?;

    let blocks = document
        .descendants()
        .filter(|node| is_scope_element(node, "projectFiles"))
        .map(|project_files| {
            let include = read_file_set(project_files);
            if include.is_empty() {
                tracing::debug!("projectFiles block without entries matches nothing");
            }
            let mut block = InclusionBlock::new(include);
            block.exclude = project_files
                .children()
                .filter(|node| is_scope_element(node, "ignoreFiles"))
                .map(read_file_set)
                .collect();
            block
        })
        .collect();

    Ok(ScopeConfig::Declared(blocks))
}

fn is_scope_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(SCOPE_XMLNS)
}

/// Collect the `directory` and `file` children of a block
fn read_file_set(block: roxmltree::Node) -> FileSet {
    let mut set = FileSet::new();
    for child in block.children().filter(|node| node.is_element()) {
        let is_directory = is_scope_element(&child, "directory");
        if !is_directory && !is_scope_element(&child, "file") {
            continue;
        }
        match child.attribute("name") {
            Some(name) if is_directory => set.add_directory(name),
            Some(name) => set.add_file(name),
            None => tracing::warn!(
                "Ignoring <{}> without a name attribute",
                child.tag_name().name()
            ),
        }
    }
    set
}
