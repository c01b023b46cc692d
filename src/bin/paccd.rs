//! Thin CLI harness around `pacc::coordinator::Coordinator`.
//!
//! Not part of the library's public contract — this exists only so the
//! crate is runnable end-to-end (reads a task list and a config file,
//! drives one `execute_parallel` call, prints the resulting report).
//! Real task execution is delegated to an external `TaskExecutor`; this
//! binary ships a no-op stand-in since that collaborator is out of
//! scope for the coordination core itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pacc::config::PaccConfig;
use pacc::coordinator::Coordinator;
use pacc::executor::{ExecutorOutput, TaskExecutor};
use pacc::sync::Cancel;
use pacc::task::Task;
use pacc::worktree::GitWorktreeProvisioner;

#[derive(Parser)]
#[command(name = "paccd", about = "Parallel agent coordination core driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch of tasks to completion and merge successful branches.
    Run {
        /// Path to a JSON or YAML task list.
        #[arg(long)]
        tasks: PathBuf,
        /// Path to the repository the worktrees/merges operate on.
        #[arg(long)]
        repo: PathBuf,
        /// Optional TOML config file; defaults are used for anything absent.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Branch to merge successful task branches into.
        #[arg(long, default_value = "main")]
        target_branch: String,
    },
    /// Compute conflicts/partitions without running or merging anything.
    Preview {
        #[arg(long)]
        tasks: PathBuf,
    },
}

/// Stand-in for a real `TaskExecutor`: records that it ran and reports
/// success without touching the worktree. A real deployment plugs in
/// whatever actually drives an LLM agent against `task.prompt`.
struct NoopExecutor;

impl TaskExecutor for NoopExecutor {
    fn execute(&self, _cancel: &Cancel, task: &Task, worktree_path: &Path) -> Result<ExecutorOutput> {
        Ok(ExecutorOutput {
            success: true,
            output: format!("(noop executor) would run '{}' in {}", task.name, worktree_path.display()),
            files: Vec::new(),
            metrics: HashMap::new(),
            total_cost: 0.0,
        })
    }
}

fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&text).with_context(|| format!("parsing {} as YAML", path.display()))
        }
        _ => serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display())),
    }
}

fn load_config(path: Option<&Path>) -> Result<PaccConfig> {
    let Some(path) = path else {
        return Ok(PaccConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {} as TOML", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")).unwrap())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            tasks,
            repo,
            config,
            target_branch,
        } => {
            let tasks = load_tasks(&tasks)?;
            let config = load_config(config.as_deref())?;
            let coordinator = Coordinator::new(
                GitWorktreeProvisioner::new(repo.clone()),
                NoopExecutor,
                repo,
                config,
            );
            let report = coordinator.execute_parallel(&Cancel::new(), tasks, target_branch)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Preview { tasks } => {
            let tasks = load_tasks(&tasks)?;
            let coordinator = Coordinator::new(
                GitWorktreeProvisioner::new("."),
                NoopExecutor,
                ".",
                PaccConfig::default(),
            );
            let preview = coordinator.preview_execution(tasks);
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
    }

    Ok(())
}
