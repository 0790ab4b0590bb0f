//! Fan-out submission: one scan job per directory, then one merge job that
//! depends on every accepted scan job.
//!
//! Submissions are strictly sequential and throttled. The orchestrator never
//! waits for jobs to finish; gating the merge on the scans is left to the
//! scheduler's `afterok` dependency.

use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::clear_scan_outputs;
use crate::batch::dedup_preserving_order;
use crate::config::{AppConfig, JobConfig};
use crate::error::{validation, ConfigError, PipelineError, SeekerError};
use crate::jobs::{
    parse_acknowledgment, DependencyExpression, EnvironmentSetup, JobCommand, JobDescriptor,
    ResourceRequest, Scheduler,
};
use crate::paths::{normalize, rename_spaces_in_place, MountConvention, MountRoots};
use crate::types::{EnumerationMode, JobRecord};

pub const MERGE_JOB_NAME: &str = "merge_and_process";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Configured,
    PartitionsBuilt,
    ScanJobsSubmitting,
    ScanJobsSubmitted,
    MergeJobBuilt,
    MergeJobSubmitted,
    Done,
    FailedNoJobs,
    FailedMerge,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Configured, PartitionsBuilt)
                | (PartitionsBuilt, ScanJobsSubmitting)
                | (ScanJobsSubmitting, ScanJobsSubmitted)
                | (ScanJobsSubmitting, FailedNoJobs)
                | (ScanJobsSubmitted, MergeJobBuilt)
                | (MergeJobBuilt, MergeJobSubmitted)
                | (MergeJobBuilt, FailedMerge)
                | (MergeJobSubmitted, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::FailedNoJobs | RunState::FailedMerge)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Validated inputs of a submission run.
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    pub directories: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub batch_dir: PathBuf,
    pub mode: EnumerationMode,
}

/// Normalizes `folders` for this host, drops the ones that are not
/// directories and derives the output locations from the first survivor.
pub fn prepare_plan(
    folders: &[String],
    mode: EnumerationMode,
    output_dir: Option<PathBuf>,
    cfg: &AppConfig,
) -> Result<SubmissionPlan, PipelineError> {
    let roots: MountRoots = cfg.paths.roots();
    let convention = MountConvention::for_host();

    let mut directories = Vec::with_capacity(folders.len());
    for folder in folders {
        if let Err(e) = validation::validate_path(folder) {
            tracing::warn!(folder = %folder, error = %e, "Skipping folder");
            continue;
        }
        let normalized = normalize(folder.trim(), convention, &roots);
        let mut dir = PathBuf::from(&normalized.path);
        if cfg.paths.rename_spaces {
            dir = rename_spaces_in_place(&dir);
        }
        match validation::validate_directory(&dir) {
            Ok(()) => directories.push(dir),
            Err(e) => tracing::warn!(folder = %folder, normalized = %normalized.path, error = %e, "Skipping folder"),
        }
    }
    let directories = dedup_preserving_order(directories);
    let Some(base) = directories.first() else {
        return Err(PipelineError::NoValidDirectories);
    };

    let output_dir = output_dir.unwrap_or_else(|| base.join(&cfg.orchestrator.output_dir_name));
    let batch_dir = output_dir.join(&cfg.orchestrator.batch_dir_name);
    Ok(SubmissionPlan { directories, output_dir, batch_dir, mode })
}

/// Knobs the orchestrator takes from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub log_dir: PathBuf,
    pub program: String,
    pub submit_delay: Duration,
    pub batch_size: NonZeroUsize,
}

impl OrchestratorSettings {
    /// `batch_size` overrides `batch.size` for this run.
    pub fn from_config(cfg: &AppConfig, batch_size: Option<usize>) -> Result<Self, ConfigError> {
        let log_dir = std::path::absolute(&cfg.orchestrator.log_dir).map_err(|e| ConfigError::Invalid {
            field: "orchestrator.log_dir".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            log_dir,
            program: cfg.orchestrator.executable.clone(),
            submit_delay: Duration::from_millis(cfg.orchestrator.submit_delay_ms),
            batch_size: validation::validate_batch_size(batch_size.unwrap_or(cfg.batch.size))?,
        })
    }
}

/// A scan unit the scheduler did not accept.
#[derive(Debug, Clone, Serialize)]
pub struct FailedUnit {
    pub index: usize,
    pub directory: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub history: Vec<RunState>,
    pub output_dir: PathBuf,
    pub batch_dir: PathBuf,
    pub records: Vec<JobRecord>,
    pub failed: Vec<FailedUnit>,
    pub dependency: Option<String>,
    pub merge: Option<JobRecord>,
    pub merge_error: Option<String>,
}

impl RunReport {
    /// Maps a failed terminal state to its error.
    pub fn ensure_success(&self) -> Result<(), PipelineError> {
        match self.state {
            RunState::FailedNoJobs => Err(PipelineError::NoJobsSubmitted { attempted: self.failed.len() }),
            RunState::FailedMerge => Err(PipelineError::MergeRejected {
                reason: self.merge_error.clone().unwrap_or_else(|| "unknown".to_string()),
            }),
            _ => Ok(()),
        }
    }

    /// Writes the report as `<dir>/submission_<run_id>.json`.
    pub fn persist(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("submission_{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

pub struct Orchestrator<S: Scheduler> {
    scheduler: S,
    resources: ResourceRequest,
    merge_resources: ResourceRequest,
    environment: EnvironmentSetup,
    working_dir: Option<PathBuf>,
    settings: OrchestratorSettings,
    state: RunState,
    history: Vec<RunState>,
}

impl<S: Scheduler> Orchestrator<S> {
    /// Fails before any side effect when the job configuration is incomplete.
    pub fn new(scheduler: S, job_config: &JobConfig, settings: OrchestratorSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            scheduler,
            resources: job_config.resources()?,
            merge_resources: job_config.merge_resources()?,
            environment: job_config.environment(),
            working_dir: job_config.working_dir(),
            settings,
            state: RunState::Configured,
            history: vec![RunState::Configured],
        })
    }

    fn transition(&mut self, next: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition { from: self.state.to_string(), to: next.to_string() });
        }
        tracing::info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn scan_descriptor(&self, index: usize, directory: &Path, plan: &SubmissionPlan) -> JobDescriptor {
        let name = format!("dir_scan_{}", index);
        JobDescriptor {
            log_file: self.settings.log_dir.join(format!("{}.txt", name)),
            name,
            index: Some(index),
            resources: self.resources.clone(),
            environment: self.environment.clone(),
            working_dir: self.working_dir.clone(),
            dependency: None,
            program: self.settings.program.clone(),
            command: JobCommand::Scan {
                directory: directory.to_path_buf(),
                output_file: plan.output_dir.join(format!("subdirectories_{}.txt", index)),
                mode: plan.mode,
            },
        }
    }

    fn merge_descriptor(&self, dependency: DependencyExpression, plan: &SubmissionPlan) -> JobDescriptor {
        JobDescriptor {
            name: MERGE_JOB_NAME.to_string(),
            index: None,
            resources: self.merge_resources.clone(),
            environment: self.environment.clone(),
            working_dir: self.working_dir.clone(),
            log_file: self.settings.log_dir.join(format!("{}.txt", MERGE_JOB_NAME)),
            dependency: Some(dependency),
            program: self.settings.program.clone(),
            command: JobCommand::Merge {
                input_dir: plan.output_dir.clone(),
                batch_dir: plan.batch_dir.clone(),
                batch_size: self.settings.batch_size.get(),
            },
        }
    }

    /// Writes the script for `descriptor` and submits it once.
    async fn submit_one(&self, descriptor: &JobDescriptor, unit: &str) -> Result<JobRecord, String> {
        let script = self.settings.log_dir.join(format!("{}.sh", descriptor.name));
        descriptor.write_script(&script).map_err(|e| e.to_string())?;
        let response = self.scheduler.submit(&script).await.map_err(|e| e.to_string())?;
        let Some(job_id) = parse_acknowledgment(&response) else {
            return Err(format!("unparsable scheduler response: '{}'", response.trim()));
        };
        Ok(JobRecord {
            job_id,
            index: descriptor.index,
            name: descriptor.name.clone(),
            script,
            unit: unit.to_string(),
        })
    }

    /// Drives a whole run. Submission failures end up in the report, which is
    /// returned for every terminal state; use [`RunReport::ensure_success`]
    /// to turn a failed run into an error.
    pub async fn run(&mut self, plan: &SubmissionPlan) -> Result<RunReport, SeekerError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            directories = plan.directories.len(),
            mode = %plan.mode,
            output_dir = %plan.output_dir.display(),
            "Starting submission run"
        );

        fs::create_dir_all(&self.settings.log_dir)?;
        fs::create_dir_all(&plan.output_dir)?;
        clear_scan_outputs(&plan.output_dir)?;

        let units: Vec<(usize, JobDescriptor, String)> = plan
            .directories
            .iter()
            .enumerate()
            .map(|(i, dir)| (i + 1, self.scan_descriptor(i + 1, dir, plan), dir.display().to_string()))
            .collect();
        self.transition(RunState::PartitionsBuilt)?;

        self.transition(RunState::ScanJobsSubmitting)?;
        let mut records = Vec::with_capacity(units.len());
        let mut failed = Vec::new();
        let mut submitted_any = false;
        for (index, descriptor, unit) in &units {
            if submitted_any {
                tokio::time::sleep(self.settings.submit_delay).await;
            }
            submitted_any = true;
            match self.submit_one(descriptor, unit).await {
                Ok(record) => {
                    tracing::info!(index, directory = %unit, job_id = %record.job_id, "Scan job submitted");
                    records.push(record);
                }
                Err(reason) => {
                    tracing::warn!(index, directory = %unit, reason = %reason, "Scan job submission failed");
                    failed.push(FailedUnit { index: *index, directory: unit.clone(), reason });
                }
            }
        }

        let mut report = RunReport {
            run_id,
            started_at,
            state: self.state,
            history: Vec::new(),
            output_dir: plan.output_dir.clone(),
            batch_dir: plan.batch_dir.clone(),
            records,
            failed,
            dependency: None,
            merge: None,
            merge_error: None,
        };

        let Some(dependency) = DependencyExpression::from_records(&report.records) else {
            tracing::error!(attempted = report.failed.len(), "No scan jobs were accepted; skipping merge job");
            self.transition(RunState::FailedNoJobs)?;
            return Ok(self.finish(report));
        };
        self.transition(RunState::ScanJobsSubmitted)?;

        report.dependency = Some(dependency.to_string());
        let merge = self.merge_descriptor(dependency, plan);
        self.transition(RunState::MergeJobBuilt)?;

        tokio::time::sleep(self.settings.submit_delay).await;
        match self.submit_one(&merge, &plan.output_dir.display().to_string()).await {
            Ok(record) => {
                tracing::info!(
                    job_id = %record.job_id,
                    dependency = report.dependency.as_deref().unwrap_or_default(),
                    "Merge job submitted"
                );
                report.merge = Some(record);
                self.transition(RunState::MergeJobSubmitted)?;
                self.transition(RunState::Done)?;
            }
            Err(reason) => {
                tracing::error!(reason = %reason, "Merge job submission failed");
                report.merge_error = Some(reason);
                self.transition(RunState::FailedMerge)?;
            }
        }
        Ok(self.finish(report))
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.state = self.state;
        report.history = self.history.clone();
        tracing::info!(
            run_id = %report.run_id,
            state = %report.state,
            submitted = report.records.len(),
            failed = report.failed.len(),
            "Submission run finished"
        );
        report
    }
}
