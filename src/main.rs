use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use stagecheck::config::Config;
use stagecheck::hook::{
    run_action, ActionConfig, ActionStatus, AnalyzerCheckAction, AnalyzerInstalled, Condition,
    Repository,
};
use stagecheck::index::GitIndex;
use stagecheck::scope::{ScopeConfigLoader, XmlScopeLoader};
use stagecheck::HookError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when the analyzer reported findings
const EXIT_ACTION_FAILED: u8 = 1;
/// Exit code when the gate itself failed
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "stagecheck")]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), env!("STAGECHECK_VERSION_SUFFIX")),
    about = "Run a static analyzer on the staged files inside its configured scope",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the staged files (pre-commit entry point)
    Run {
        /// Directory inside the repository (default: current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// Show which paths belong to the analyzer's scope
    Scope {
        /// Project root holding the scope document (default: current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Project-relative paths to test
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Exit successfully if the analyzer binary is installed
    Installed {
        /// Project root (default: current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ScopeDecision<'a> {
    path: &'a str,
    in_scope: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the analyzer's findings
    let filter = if cli.verbose {
        "stagecheck=debug"
    } else {
        "stagecheck=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn working_dir(cwd: Option<PathBuf>) -> PathBuf {
    cwd.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| ".".into()))
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run { cwd } => {
            let index = GitIndex::discover(&working_dir(cwd))?;
            let root = index.root().to_path_buf();
            tracing::info!("Checking staged files in {:?}", root);

            let action_config = ActionConfig::new(Config::load_for_project(&root)?);
            let mut conditions: Vec<&dyn Condition> = Vec::new();
            if action_config.settings.conditions.require_installed {
                conditions.push(&AnalyzerInstalled);
            }

            let repository = Repository::new(root, Arc::new(index));
            let action = AnalyzerCheckAction::new();
            match run_action(&action, &conditions, &repository, &action_config).await {
                Ok(ActionStatus::Passed) => Ok(ExitCode::SUCCESS),
                Ok(ActionStatus::Skipped) => {
                    let analyzer = &action_config.settings.analyzer;
                    eprintln!(
                        "{} is not installed at {}, skipping",
                        analyzer.name, analyzer.binary
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(HookError::ActionFailed(message)) => {
                    eprintln!("{}", message);
                    Ok(ExitCode::from(EXIT_ACTION_FAILED))
                }
                Err(HookError::Fatal(e)) => Err(e),
            }
        }
        Commands::Scope { cwd, format, paths } => {
            let root = working_dir(cwd);
            let settings = Config::load_for_project(&root)?;
            let scope = XmlScopeLoader::new(settings.scope.config_files).load_for_project(&root)?;

            let decisions: Vec<ScopeDecision> = paths
                .iter()
                .map(|path| ScopeDecision {
                    path,
                    in_scope: scope.belongs_to_scope(path),
                })
                .collect();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decisions)?),
                OutputFormat::Text => {
                    for decision in &decisions {
                        let marker = if decision.in_scope { '+' } else { '-' };
                        println!("{} {}", marker, decision.path);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Installed { cwd } => {
            let root = working_dir(cwd);
            let action_config = ActionConfig::new(Config::load_for_project(&root)?);
            let repository = Repository::new(root.clone(), Arc::new(GitIndex::new(root)));

            if AnalyzerInstalled.is_true(&repository, &action_config) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
