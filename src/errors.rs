//! Domain error types
//!
//! Typed failures for each stage of a check: loading the scope document,
//! reading the index, running the analyzer and reporting back to the hook
//! host. Plumbing code converts these into `anyhow::Error` at the edges.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a scope document
#[derive(Debug, Error)]
pub enum ScopeConfigError {
    /// The document exists but could not be read
    #[error("Failed to read scope document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML
    #[error("Malformed scope document {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Errors raised by an index reader
#[derive(Debug, Error)]
pub enum IndexError {
    /// git could not be spawned at all
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// git ran but reported a failure
    #[error("Git command failed: {0}")]
    CommandFailed(String),
}

/// Errors that abort a check before an outcome can be classified
#[derive(Debug, Error)]
pub enum CheckError {
    /// The scope document could not be loaded
    #[error(transparent)]
    Config(#[from] ScopeConfigError),

    /// The staged file list could not be read
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The analyzer process could not be started or did not finish
    #[error("Failed to run analyzer: {0}")]
    Process(String),

    /// A staged path cannot be passed safely on a command line
    #[error("Cannot quote argument {0:?} for the shell")]
    Quote(String),

    /// The analyzer exited with a code outside its documented contract
    #[error("{analyzer} returned with an unexpected code {code}")]
    UnexpectedExitCode { analyzer: String, code: i32 },
}

impl CheckError {
    /// Exit code carried by an unexpected-code failure
    pub fn unexpected_code(&self) -> Option<i32> {
        match self {
            CheckError::UnexpectedExitCode { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Signals returned to the hook host
///
/// The host treats these differently:
/// - `ActionFailed` is an expected gate failure the committer can fix
/// - `Fatal` is an operational fault in the tool or its integration
#[derive(Debug, Error)]
pub enum HookError {
    /// The analyzer reported findings in the staged files
    #[error("{0}")]
    ActionFailed(String),

    /// Anything else that stopped the action
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl From<CheckError> for HookError {
    fn from(err: CheckError) -> Self {
        HookError::Fatal(err.into())
    }
}
