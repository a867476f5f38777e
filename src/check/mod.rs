//! Staged file check orchestration
//!
//! Sequences one pre-commit check: load the scope, ask the index which
//! files of the analyzed type are staged, keep the ones in scope, run the
//! analyzer once on all of them and classify its exit code.

use crate::errors::CheckError;
use crate::index::IndexReader;
use crate::process::{build_command_line, CommandResult, ProcessRunner};
use crate::scope::ScopeConfigLoader;
use std::path::Path;
use std::sync::Arc;

/// Analyzer exit code for a clean run
pub const EXIT_SUCCESS: i32 = 0;
/// Analyzer exit code when the tool itself failed
pub const EXIT_TOOL_FAILURE: i32 = 1;
/// Analyzer exit code when it reported findings
pub const EXIT_FINDINGS: i32 = 2;

/// Classified result of a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to check, or the analyzer found no issues
    Success,
    /// The analyzer reported findings; the message carries its stdout
    PolicyViolation(String),
    /// The analyzer could not run correctly; the message carries its stderr
    ToolError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// How to invoke the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerCommand {
    /// Display name used in outcome messages
    pub name: String,
    /// Executable path relative to the repository root
    pub binary: String,
    /// Extension of the staged files to analyze
    pub file_type: String,
}

impl Default for AnalyzerCommand {
    fn default() -> Self {
        Self {
            name: "Psalm".to_string(),
            binary: "./vendor/bin/psalm".to_string(),
            file_type: "php".to_string(),
        }
    }
}

impl AnalyzerCommand {
    /// Binary path with `/` mapped to the platform separator
    pub fn program(&self) -> String {
        self.binary.replace('/', std::path::MAIN_SEPARATOR_STR)
    }

    /// Map an exit code to an outcome
    pub fn classify(&self, result: CommandResult) -> Result<Outcome, CheckError> {
        match result.exit_code {
            EXIT_SUCCESS => Ok(Outcome::Success),
            EXIT_FINDINGS => Ok(Outcome::PolicyViolation(format!(
                "{} found errors in files to be committed:\n{}",
                self.name, result.stdout
            ))),
            EXIT_TOOL_FAILURE => Ok(Outcome::ToolError(format!(
                "Failed to check files using {}:\n{}",
                self.name, result.stderr
            ))),
            code => Err(CheckError::UnexpectedExitCode {
                analyzer: self.name.clone(),
                code,
            }),
        }
    }
}

/// Runs the analyzer on the in-scope staged files of one repository
pub struct CheckOrchestrator {
    analyzer: AnalyzerCommand,
    scope_loader: Arc<dyn ScopeConfigLoader>,
    index: Arc<dyn IndexReader>,
    runner: Arc<dyn ProcessRunner>,
}

impl CheckOrchestrator {
    pub fn new(
        analyzer: AnalyzerCommand,
        scope_loader: Arc<dyn ScopeConfigLoader>,
        index: Arc<dyn IndexReader>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            analyzer,
            scope_loader,
            index,
            runner,
        }
    }

    /// Check the staged files of the repository at `repository_root`
    pub async fn run(&self, repository_root: &Path) -> Result<Outcome, CheckError> {
        let scope = self.scope_loader.load_for_project(repository_root)?;
        let file_type = self.analyzer.file_type.as_str();

        if !self.index.has_staged_files_of_type(file_type)? {
            tracing::info!("No staged .{} files, nothing to check", file_type);
            return Ok(Outcome::Success);
        }

        let staged = self.index.list_staged_files_of_type(file_type)?;
        let checked = scope.filter(&staged);
        if checked.is_empty() {
            tracing::info!(
                "None of the {} staged .{} file(s) are in scope",
                staged.len(),
                file_type
            );
            return Ok(Outcome::Success);
        }

        let command_line = build_command_line(&self.analyzer.program(), &checked)?;
        tracing::info!(
            "Checking {} of {} staged file(s) with {}",
            checked.len(),
            staged.len(),
            self.analyzer.name
        );
        let result = self.runner.run(&command_line, repository_root).await?;
        tracing::debug!("{} exited with code {}", self.analyzer.name, result.exit_code);

        self.analyzer.classify(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{IndexError, ScopeConfigError};
    use crate::scope::{FileSet, InclusionBlock, ScopeConfig};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const REPOSITORY_ROOT: &str = "/path/to/repo";

    struct FixedScope(ScopeConfig);

    impl ScopeConfigLoader for FixedScope {
        fn load_for_project(&self, project_root: &Path) -> Result<ScopeConfig, ScopeConfigError> {
            assert_eq!(project_root, Path::new(REPOSITORY_ROOT));
            Ok(self.0.clone())
        }
    }

    struct BrokenScope;

    impl ScopeConfigLoader for BrokenScope {
        fn load_for_project(&self, project_root: &Path) -> Result<ScopeConfig, ScopeConfigError> {
            Err(ScopeConfigError::Malformed {
                path: project_root.join("scope.xml"),
                message: "unexpected end of stream".to_string(),
            })
        }
    }

    struct FakeIndex {
        has_staged: bool,
        staged: Vec<String>,
        list_calls: Mutex<usize>,
    }

    impl FakeIndex {
        fn new(has_staged: bool, staged: &[&str]) -> Self {
            Self {
                has_staged,
                staged: staged.iter().map(|s| s.to_string()).collect(),
                list_calls: Mutex::new(0),
            }
        }
    }

    impl IndexReader for FakeIndex {
        fn has_staged_files_of_type(&self, ext: &str) -> Result<bool, IndexError> {
            assert_eq!(ext, "php");
            Ok(self.has_staged)
        }

        fn list_staged_files_of_type(&self, ext: &str) -> Result<Vec<String>, IndexError> {
            assert_eq!(ext, "php");
            *self.list_calls.lock().unwrap() += 1;
            Ok(self.staged.clone())
        }
    }

    struct RecordingRunner {
        result: CommandResult,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        fn returning(result: CommandResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(
            &self,
            command_line: &str,
            working_dir: &Path,
        ) -> Result<CommandResult, CheckError> {
            assert_eq!(working_dir, Path::new(REPOSITORY_ROOT));
            self.calls.lock().unwrap().push(command_line.to_string());
            Ok(self.result.clone())
        }
    }

    fn orchestrator(
        scope: ScopeConfig,
        index: FakeIndex,
        runner: Arc<RecordingRunner>,
    ) -> CheckOrchestrator {
        CheckOrchestrator::new(
            AnalyzerCommand::default(),
            Arc::new(FixedScope(scope)),
            Arc::new(index),
            runner,
        )
    }

    fn expected_command(files: &[&str]) -> String {
        let mut line = AnalyzerCommand::default().program();
        for file in files {
            line.push(' ');
            line.push_str(&crate::process::escape_arg(file).unwrap());
        }
        line
    }

    async fn run(
        scope: ScopeConfig,
        index: FakeIndex,
        runner: Arc<RecordingRunner>,
    ) -> Result<Outcome, CheckError> {
        orchestrator(scope, index, runner)
            .run(Path::new(REPOSITORY_ROOT))
            .await
    }

    #[tokio::test]
    async fn test_returns_when_no_files_were_staged() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(false, &[]);

        let outcome = run(ScopeConfig::Missing, index, runner.clone()).await.unwrap();

        assert!(outcome.is_success());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_does_not_list_files_when_none_are_staged() {
        let index = Arc::new(FakeIndex::new(false, &["foo.php"]));
        let orchestrator = CheckOrchestrator::new(
            AnalyzerCommand::default(),
            Arc::new(FixedScope(ScopeConfig::Missing)),
            index.clone(),
            RecordingRunner::returning(CommandResult::new(0)),
        );

        orchestrator.run(Path::new(REPOSITORY_ROOT)).await.unwrap();
        assert_eq!(*index.list_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_returns_when_no_staged_file_is_in_scope() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(true, &["foo.php", "bar.php"]);

        let outcome = run(ScopeConfig::Declared(Vec::new()), index, runner.clone())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Success);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_runs_analyzer_on_staged_files_in_order() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(true, &["foo.php", "bar.php"]);

        let outcome = run(ScopeConfig::Missing, index, runner.clone()).await.unwrap();

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(runner.calls(), vec![expected_command(&["foo.php", "bar.php"])]);
    }

    #[tokio::test]
    async fn test_only_checks_files_in_scope() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(true, &["foo.php", "bar.php"]);
        let scope = ScopeConfig::Declared(vec![InclusionBlock::new(
            FileSet::new().with_file("bar.php"),
        )]);

        run(scope, index, runner.clone()).await.unwrap();

        assert_eq!(runner.calls(), vec![expected_command(&["bar.php"])]);
    }

    #[tokio::test]
    async fn test_filters_through_nested_exclusions() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(
            true,
            &["src/A.php", "src/Generated/B.php", "README.php", "docs/C.php"],
        );
        let scope = ScopeConfig::Declared(vec![InclusionBlock::new(
            FileSet::new()
                .with_directory("src")
                .with_file("README.php"),
        )
        .excluding(FileSet::new().with_directory("src/Generated"))]);

        run(scope, index, runner.clone()).await.unwrap();

        assert_eq!(runner.calls(), vec![expected_command(&["src/A.php", "README.php"])]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quotes_file_arguments() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let index = FakeIndex::new(true, &["src/My File.php"]);

        run(ScopeConfig::Missing, index, runner.clone()).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let args = shlex::split(&calls[0]).unwrap();
        assert_eq!(args[1], "src/My File.php");
    }

    #[tokio::test]
    async fn test_findings_are_a_policy_violation() {
        let runner = RecordingRunner::returning(CommandResult::new(2).with_stdout("E1"));
        let index = FakeIndex::new(true, &["foo.php", "bar.php"]);

        let outcome = run(ScopeConfig::Missing, index, runner.clone()).await.unwrap();

        match outcome {
            Outcome::PolicyViolation(message) => {
                assert!(message.starts_with("Psalm found errors in files to be committed:"));
                assert!(message.contains("E1"));
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_is_a_tool_error() {
        let runner = RecordingRunner::returning(
            CommandResult::new(1)
                .with_stdout("ignored")
                .with_stderr("E2"),
        );
        let index = FakeIndex::new(true, &["foo.php"]);

        let outcome = run(ScopeConfig::Missing, index, runner).await.unwrap();

        match outcome {
            Outcome::ToolError(message) => {
                assert!(message.starts_with("Failed to check files using Psalm:"));
                assert!(message.contains("E2"));
                assert!(!message.contains("ignored"));
            }
            other => panic!("expected tool error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_exit_code_is_fatal() {
        let runner = RecordingRunner::returning(CommandResult::new(7));
        let index = FakeIndex::new(true, &["foo.php"]);

        let err = run(ScopeConfig::Missing, index, runner).await.unwrap_err();

        assert_eq!(err.unexpected_code(), Some(7));
    }

    #[tokio::test]
    async fn test_malformed_scope_fails_before_running() {
        let runner = RecordingRunner::returning(CommandResult::new(0));
        let orchestrator = CheckOrchestrator::new(
            AnalyzerCommand::default(),
            Arc::new(BrokenScope),
            Arc::new(FakeIndex::new(true, &["foo.php"])),
            runner.clone(),
        );

        let err = orchestrator
            .run(Path::new(REPOSITORY_ROOT))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::Config(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_classify_signal_termination_is_unexpected() {
        let err = AnalyzerCommand::default()
            .classify(CommandResult::new(crate::process::NO_EXIT_CODE))
            .unwrap_err();
        assert_eq!(err.unexpected_code(), Some(-1));
    }
}
