//! Staged file discovery
//!
//! The orchestrator only needs two questions answered about the index:
//! whether anything of a given type is staged, and which paths those are.

use crate::errors::IndexError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Read-only view of the version-control index
pub trait IndexReader: Send + Sync {
    /// Whether at least one staged file has extension `ext`
    fn has_staged_files_of_type(&self, ext: &str) -> Result<bool, IndexError> {
        Ok(!self.list_staged_files_of_type(ext)?.is_empty())
    }

    /// Staged files with extension `ext`, in index order
    fn list_staged_files_of_type(&self, ext: &str) -> Result<Vec<String>, IndexError>;
}

/// Index reader backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitIndex {
    root: PathBuf,
}

impl GitIndex {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the top level of the repository containing `dir`
    pub fn discover(dir: &Path) -> Result<Self, IndexError> {
        let output = run_git_command(dir, &["rev-parse", "--show-toplevel"])?;
        Ok(Self::new(PathBuf::from(output.trim())))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All added, copied, modified or renamed paths in the index
    fn staged_paths(&self) -> Result<Vec<String>, IndexError> {
        let output = run_git_command(
            &self.root,
            &[
                "-c",
                "core.quotepath=false",
                "diff",
                "--cached",
                "--name-only",
                "--diff-filter=ACMR",
                "-z",
            ],
        )?;
        Ok(parse_name_only(&output))
    }
}

impl IndexReader for GitIndex {
    fn list_staged_files_of_type(&self, ext: &str) -> Result<Vec<String>, IndexError> {
        let files: Vec<String> = self
            .staged_paths()?
            .into_iter()
            .filter(|path| has_extension(path, ext))
            .collect();
        tracing::debug!("{} staged .{} file(s)", files.len(), ext);
        Ok(files)
    }
}

/// Parse `git diff --name-only -z` output
///
/// Paths are NUL-terminated and never C-quoted, so names containing quotes,
/// backslashes, tabs or newlines come through verbatim.
fn parse_name_only(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|found| found == ext)
}

/// Run a git command in `working_dir` and return its stdout
fn run_git_command(working_dir: &Path, args: &[&str]) -> Result<String, IndexError> {
    let output = Command::new("git")
        .current_dir(working_dir)
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(IndexError::CommandFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}
