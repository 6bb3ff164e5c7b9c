//! Layered runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `BOARDFLOW_*` environment variables. Nested keys use a double underscore,
//! e.g. `BOARDFLOW_RETRY__MAX_ATTEMPTS=5`.

use crate::task::{
    adapters::file::{StatusLabelError, StatusLabels, default_native_label, default_workflow_label},
    domain::{NativeStatus, WorkflowStatus},
    services::RetryPolicy,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// File read when no explicit configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "boardflow.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "BOARDFLOW";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The configured status labels are incomplete or ambiguous.
    #[error("invalid status labels: {0}")]
    Labels(#[from] StatusLabelError),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardflowConfig {
    /// Path of the JSON board file.
    pub board_path: Utf8PathBuf,
    /// Turn every write into a no-op that reports its effect.
    pub simulate: bool,
    /// Retry settings for store calls.
    pub retry: RetryConfig,
    /// Label overrides for status fields.
    pub labels: LabelConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

impl Default for BoardflowConfig {
    fn default() -> Self {
        Self {
            board_path: Utf8PathBuf::from("board.json"),
            simulate: false,
            retry: RetryConfig::default(),
            labels: LabelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per store call, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Builds the retry policy described by these settings.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Label overrides, keyed by status.
///
/// Statuses without an override keep their default label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Workflow field labels.
    pub workflow: BTreeMap<WorkflowStatus, String>,
    /// Native field labels.
    pub native: BTreeMap<NativeStatus, String>,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `BOARDFLOW_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl BoardflowConfig {
    /// Loads configuration.
    ///
    /// When `path` is given the file must exist. Otherwise
    /// [`DEFAULT_CONFIG_FILE`] is read if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source is unreadable or holds
    /// values of the wrong type.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let file = path.map_or_else(
            || File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
            |explicit| File::new(explicit.as_str(), FileFormat::Toml).required(true),
        );
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Builds the label table, filling unconfigured statuses with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Labels`] when two statuses of one field share a
    /// label.
    pub fn status_labels(&self) -> Result<StatusLabels, ConfigError> {
        let workflow = WorkflowStatus::ALL
            .into_iter()
            .map(|status| {
                let label = self
                    .labels
                    .workflow
                    .get(&status)
                    .map_or_else(|| default_workflow_label(status).to_owned(), Clone::clone);
                (status, label)
            })
            .collect();
        let native = NativeStatus::ALL
            .into_iter()
            .map(|status| {
                let label = self
                    .labels
                    .native
                    .get(&status)
                    .map_or_else(|| default_native_label(status).to_owned(), Clone::clone);
                (status, label)
            })
            .collect();
        Ok(StatusLabels::new(workflow, native)?)
    }
}
