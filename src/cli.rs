//! Command-line front end over the JSON board file.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

use crate::{
    config::{BoardflowConfig, ConfigError},
    task::{
        adapters::file::{FileStoreError, FileTaskStore},
        domain::{BoardRevision, Cycle, SyncDriftError, Task, TaskId, detect_cycle},
        ports::{TaskStore, TaskStoreError, WriteMode},
        services::{WorkflowCommand, WorkflowError, WorkflowService},
    },
    telemetry::TelemetryError,
};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;

/// Workflow state machine for project-board tasks.
#[derive(Debug, Parser)]
#[command(name = "boardflow", version)]
#[command(about = "Validated workflow transitions and dependency tracking for board tasks")]
pub struct Cli {
    /// Configuration file (defaults to ./boardflow.toml when present).
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Board file, overriding the configured path.
    #[arg(long, global = true)]
    pub board: Option<Utf8PathBuf>,

    /// Report what would be written without writing anything.
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Board operations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start work on a ready task.
    Start {
        /// Task number, with or without a leading `#`.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
    /// Submit in-progress work for review.
    Review {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
        /// Hand-off message for the reviewer.
        #[arg(long, short, default_value = "")]
        message: String,
    },
    /// Approve reviewed work.
    Approve {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
        /// Approval summary.
        #[arg(long, short, default_value = "")]
        message: String,
    },
    /// Send reviewed work back with feedback.
    Rework {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
        /// What must change.
        #[arg(long, short)]
        feedback: String,
    },
    /// Complete in-progress work without review.
    Complete {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
        /// Completion note.
        #[arg(long, short, default_value = "")]
        message: String,
    },
    /// Move a task to ready regardless of its dependencies.
    ForceReady {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
    /// Move a backlog task to ready or blocked.
    Triage {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
    /// Replace a task's dependencies, e.g. `depend 4 "#1, #2"`.
    Depend {
        /// Task number.
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
        /// Dependency declaration; empty clears all dependencies.
        #[arg(default_value = "")]
        declaration: String,
    },
    /// Rewrite native fields that disagree with their workflow field.
    Reconcile,
    /// Print every task with drift and cycle diagnostics.
    List,
}

impl Cli {
    /// Loads configuration and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when configuration cannot be loaded.
    pub fn load_config(&self) -> Result<BoardflowConfig, CliError> {
        let mut config = BoardflowConfig::load(self.config.as_deref())?;
        if let Some(board) = &self.board {
            config.board_path.clone_from(board);
        }
        config.simulate |= self.simulate;
        Ok(config)
    }
}

impl Command {
    fn into_workflow_command(self) -> Option<WorkflowCommand> {
        Some(match self {
            Self::Start { task } => WorkflowCommand::Start { task_id: task },
            Self::Review { task, message } => WorkflowCommand::SubmitForReview {
                task_id: task,
                message,
            },
            Self::Approve { task, message } => WorkflowCommand::Approve {
                task_id: task,
                message,
            },
            Self::Rework { task, feedback } => WorkflowCommand::RequestRework {
                task_id: task,
                feedback,
            },
            Self::Complete { task, message } => WorkflowCommand::CompleteDirect {
                task_id: task,
                message,
            },
            Self::ForceReady { task } => WorkflowCommand::ForceReady { task_id: task },
            Self::Triage { task } => WorkflowCommand::Triage { task_id: task },
            Self::Depend { task, declaration } => WorkflowCommand::DeclareDependencies {
                task_id: task,
                declaration,
            },
            Self::Reconcile | Self::List => return None,
        })
    }
}

/// Errors that stop the command before it can report a structured result.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The board file could not be opened.
    #[error(transparent)]
    Board(#[from] FileStoreError),

    /// The board could not be read.
    #[error(transparent)]
    Store(#[from] TaskStoreError),

    /// Reconciliation could not read the board.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The result could not be written.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    /// The result could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct BoardListing<'a> {
    revision: BoardRevision,
    tasks: Vec<&'a Task>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    drift: Vec<SyncDriftError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<Cycle>,
}

/// Runs `command` against the configured board.
///
/// Returns whether the requested operation succeeded; a rejected transition
/// is reported on `out` and yields `Ok(false)`.
///
/// # Errors
///
/// Returns [`CliError`] when the board file cannot be opened or read, or the
/// result cannot be written.
pub async fn run(
    command: Command,
    config: &BoardflowConfig,
    out: &mut impl Write,
) -> Result<bool, CliError> {
    let store = Arc::new(FileTaskStore::open(
        &config.board_path,
        config.status_labels()?,
    )?);
    let service = WorkflowService::new(Arc::clone(&store), Arc::new(DefaultClock))
        .with_retry_policy(config.retry.policy())
        .with_write_mode(WriteMode::from_simulate(config.simulate));

    match command {
        Command::Reconcile => {
            let report = service.reconcile().await?;
            write_json(out, &report)?;
            Ok(report.failed.is_empty())
        }
        Command::List => {
            let snapshot = store.list_tasks().await?;
            let listing = BoardListing {
                revision: snapshot.revision,
                tasks: snapshot.board.iter().collect(),
                drift: snapshot
                    .board
                    .iter()
                    .filter_map(SyncDriftError::for_task)
                    .collect(),
                cycle: detect_cycle(&snapshot.board),
            };
            write_json(out, &listing)?;
            Ok(true)
        }
        other => match other.into_workflow_command() {
            Some(command_to_run) => {
                let outcome = service.execute(&command_to_run).await;
                write_json(out, &outcome)?;
                Ok(outcome.ok)
            }
            None => Ok(false),
        },
    }
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Parses a task number written as `7` or `#7`.
///
/// # Errors
///
/// Returns a message when the text is not a positive integer.
pub fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    let digits = raw.trim().trim_start_matches('#');
    let value = digits
        .parse::<u64>()
        .map_err(|err| format!("'{raw}' is not a task number: {err}"))?;
    TaskId::new(value).map_err(|err| err.to_string())
}
