//! Hook host integration
//!
//! A hook host hands each configured action the repository it runs in and
//! the action's settings. Actions report back through [`HookError`]:
//! `ActionFailed` blocks the commit with a message for the committer,
//! `Fatal` means the gate itself is broken.

use crate::check::{CheckOrchestrator, Outcome};
use crate::config::Config;
use crate::errors::HookError;
use crate::index::IndexReader;
use crate::process::{ProcessRunner, ShellRunner};
use crate::scope::{ScopeConfigLoader, XmlScopeLoader};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The repository a hook runs in
#[derive(Clone)]
pub struct Repository {
    root: PathBuf,
    index: Arc<dyn IndexReader>,
}

impl Repository {
    pub fn new(root: PathBuf, index: Arc<dyn IndexReader>) -> Self {
        Self { root, index }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> Arc<dyn IndexReader> {
        Arc::clone(&self.index)
    }
}

/// Descriptor of one configured action
#[derive(Debug, Clone, Default)]
pub struct ActionConfig {
    pub settings: Config,
}

impl ActionConfig {
    pub fn new(settings: Config) -> Self {
        Self { settings }
    }
}

/// A hook action
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, repository: &Repository, action: &ActionConfig)
        -> Result<(), HookError>;
}

/// Precondition evaluated before an action runs
pub trait Condition: Send + Sync {
    fn is_true(&self, repository: &Repository, action: &ActionConfig) -> bool;
}

/// True when the configured analyzer binary exists in the repository
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerInstalled;

impl Condition for AnalyzerInstalled {
    fn is_true(&self, repository: &Repository, action: &ActionConfig) -> bool {
        let program = action.settings.analyzer.command().program();
        repository.root().join(program).is_file()
    }
}

/// Runs the configured analyzer on the in-scope staged files
#[derive(Default)]
pub struct AnalyzerCheckAction {
    runner: Option<Arc<dyn ProcessRunner>>,
    scope_loader: Option<Arc<dyn ScopeConfigLoader>>,
}

impl AnalyzerCheckAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shell runner built from the settings
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Replace the XML loader built from the settings
    pub fn with_scope_loader(mut self, scope_loader: Arc<dyn ScopeConfigLoader>) -> Self {
        self.scope_loader = Some(scope_loader);
        self
    }

    fn orchestrator(&self, repository: &Repository, action: &ActionConfig) -> CheckOrchestrator {
        let settings = &action.settings;
        let runner = self.runner.clone().unwrap_or_else(|| {
            let runner = match settings.analyzer.timeout() {
                Some(timeout) => ShellRunner::new().with_timeout(timeout),
                None => ShellRunner::new(),
            };
            Arc::new(runner)
        });
        let scope_loader = self.scope_loader.clone().unwrap_or_else(|| {
            Arc::new(XmlScopeLoader::new(settings.scope.config_files.clone()))
        });

        CheckOrchestrator::new(
            settings.analyzer.command(),
            scope_loader,
            repository.index(),
            runner,
        )
    }
}

#[async_trait]
impl Action for AnalyzerCheckAction {
    async fn execute(
        &self,
        repository: &Repository,
        action: &ActionConfig,
    ) -> Result<(), HookError> {
        let outcome = self
            .orchestrator(repository, action)
            .run(repository.root())
            .await?;

        match outcome {
            Outcome::Success => Ok(()),
            Outcome::PolicyViolation(message) => Err(HookError::ActionFailed(message)),
            Outcome::ToolError(message) => Err(HookError::Fatal(anyhow::anyhow!(message))),
        }
    }
}

/// What happened to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The action ran and passed
    Passed,
    /// A condition was false so the action did not run
    Skipped,
}

/// Evaluate `conditions` and run `action` when all of them hold
pub async fn run_action(
    action: &dyn Action,
    conditions: &[&dyn Condition],
    repository: &Repository,
    config: &ActionConfig,
) -> Result<ActionStatus, HookError> {
    if !conditions
        .iter()
        .all(|condition| condition.is_true(repository, config))
    {
        tracing::warn!("Skipping action, a condition was not met");
        return Ok(ActionStatus::Skipped);
    }

    action.execute(repository, config).await?;
    Ok(ActionStatus::Passed)
}
