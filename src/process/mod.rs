//! External process execution
//!
//! The analyzer is run through a [`ProcessRunner`] so the orchestrator can
//! be exercised with canned results instead of real processes.

use crate::errors::CheckError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Exit code reported when the process was terminated by a signal
pub const NO_EXIT_CODE: i32 = -1;

/// Captured result of one process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn is_successful(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command line and captures its output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command_line: &str, working_dir: &Path)
        -> Result<CommandResult, CheckError>;
}

/// Runs command lines through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on the process after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(
        &self,
        command_line: &str,
        working_dir: &Path,
    ) -> Result<CommandResult, CheckError> {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        tracing::debug!("Running `{}` in {:?}", command_line, working_dir);
        let mut command = Command::new(shell);
        command
            .arg(shell_arg)
            .arg(command_line)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| {
                    CheckError::Process(format!("command timed out after {:?}", timeout))
                })?,
            None => command.output().await,
        }
        .map_err(|e| CheckError::Process(e.to_string()))?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(NO_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Quote one argument for the shell [`ShellRunner`] uses on this platform
pub fn escape_arg(arg: &str) -> Result<String, CheckError> {
    if cfg!(windows) {
        quote_for_cmd(arg)
    } else {
        quote_for_sh(arg)
    }
}

/// POSIX quoting; arguments that need none are returned unchanged
fn quote_for_sh(arg: &str) -> Result<String, CheckError> {
    shlex::try_quote(arg)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| CheckError::Quote(arg.to_string()))
}

/// `cmd.exe` quoting
///
/// `cmd` has no escape for `"` inside a quoted argument and expands `%` and
/// `!` even there, so those characters are replaced with spaces.
fn quote_for_cmd(arg: &str) -> Result<String, CheckError> {
    if arg.contains('\0') {
        return Err(CheckError::Quote(arg.to_string()));
    }
    let cleaned: String = arg
        .chars()
        .map(|c| if matches!(c, '"' | '%' | '!') { ' ' } else { c })
        .collect();
    Ok(format!("\"{}\"", cleaned))
}

/// Build `<program> <arg>...` with every argument quoted
pub fn build_command_line<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String, CheckError> {
    let mut command_line = program.to_string();
    for arg in args {
        command_line.push(' ');
        command_line.push_str(&escape_arg(arg.as_ref())?);
    }
    Ok(command_line)
}
