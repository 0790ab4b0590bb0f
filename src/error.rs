//! Error taxonomy for the pipeline.
//!
//! Configuration and pipeline errors are fatal and surface through `main`
//! with a non-zero exit. Submission errors are per job: the orchestrator logs
//! them, drops the unit from the dependency set and keeps going. Traversal
//! and per-file aggregation failures never become errors at all; they are
//! logged and counted in the stage summaries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum SeekerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// A whole aggregation unit (a partition file) could not be processed.
    #[error("Aggregation failed for '{}': {reason}", .path.display())]
    Aggregation { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Invalid or incomplete configuration. Always reported before any job is
/// submitted or any file is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration fields: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed configuration file '{}': {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

impl From<globset::Error> for ConfigError {
    fn from(err: globset::Error) -> Self {
        ConfigError::Invalid { field: "scan.excludes".to_string(), message: err.to_string() }
    }
}

/// A single job the scheduler did not accept.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Failed to write job script '{}': {source}", .script.display())]
    ScriptWrite {
        script: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run '{command}' for '{}': {source}", .script.display())]
    Spawn {
        command: String,
        script: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Scheduler rejected '{}' (exit code {code:?}): {stderr}", .script.display())]
    Rejected { script: PathBuf, code: Option<i32>, stderr: String },

    #[error("Unparsable scheduler response: '{response}'")]
    Unparsable { response: String },
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No valid directories to scan")]
    NoValidDirectories,

    #[error("No scan jobs were accepted by the scheduler ({attempted} attempted)")]
    NoJobsSubmitted { attempted: usize },

    #[error("Merge job was not accepted: {reason}")]
    MergeRejected { reason: String },

    #[error("Illegal run state transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Input checks shared by the CLI commands and the configuration loader.
pub mod validation {
    use super::ConfigError;
    use std::num::NonZeroUsize;
    use std::path::Path;

    /// Rejects empty paths and paths containing NUL bytes.
    pub fn validate_path(path: &str) -> Result<(), ConfigError> {
        if path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "path".to_string(),
                message: "Path cannot be empty".to_string(),
            });
        }

        if path.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "path".to_string(),
                message: "Path contains null characters".to_string(),
            });
        }

        Ok(())
    }

    /// Validates a batch size and converts it for the partitioner.
    pub fn validate_batch_size(size: usize) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(size).ok_or_else(|| ConfigError::Invalid {
            field: "batch.size".to_string(),
            message: "must be > 0".to_string(),
        })
    }

    /// Fails unless `path` is an existing directory.
    pub fn validate_directory(path: &Path) -> Result<(), ConfigError> {
        if !path.is_dir() {
            return Err(ConfigError::Invalid {
                field: "directory".to_string(),
                message: format!("not a directory: {}", path.display()),
            });
        }
        Ok(())
    }
}
