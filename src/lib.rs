//! stagecheck: pre-commit gate for static analyzers
//!
//! This library provides:
//! - Scope matching against the analyzer's XML scope document
//! - Staged file discovery through git
//! - Analyzer invocation and exit-code classification
//! - Hook host integration (actions and conditions)

pub mod check;
pub mod config;
pub mod errors;
pub mod hook;
pub mod index;
pub mod process;
pub mod scope;

pub use check::{AnalyzerCommand, CheckOrchestrator, Outcome};
pub use config::Config;
pub use errors::{CheckError, HookError, IndexError, ScopeConfigError};
pub use scope::{FileSet, InclusionBlock, ScopeConfig};
