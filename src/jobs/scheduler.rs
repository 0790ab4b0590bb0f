use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SubmissionError;

/// Batch scheduler front end.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Submits `script` and returns the raw acknowledgment text.
    async fn submit(&self, script: &Path) -> Result<String, SubmissionError>;
}

/// Runs `sbatch <script>` (or a configured replacement).
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    command: String,
}

impl SlurmScheduler {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    async fn submit(&self, script: &Path) -> Result<String, SubmissionError> {
        let output = Command::new(&self.command).arg(script).output().await.map_err(|source| {
            SubmissionError::Spawn { command: self.command.clone(), script: script.to_path_buf(), source }
        })?;
        if !output.status.success() {
            return Err(SubmissionError::Rejected {
                script: script.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Job id from a `Submitted batch job <id>` acknowledgment.
///
/// The response must be a single non-empty line whose last token is a
/// decimal integer.
pub fn parse_acknowledgment(response: &str) -> Option<String> {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());
    let line = lines.next()?;
    if lines.next().is_some() {
        return None;
    }
    let token = line.split_whitespace().last()?;
    token.parse::<u64>().ok().map(|_| token.to_string())
}
