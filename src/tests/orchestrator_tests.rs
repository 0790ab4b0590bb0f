#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use crate::config::{AppConfig, JobConfig};
    use crate::error::{ConfigError, PipelineError, SubmissionError};
    use crate::jobs::Scheduler;
    use crate::orchestrator::{prepare_plan, Orchestrator, OrchestratorSettings, RunState, SubmissionPlan};
    use crate::types::EnumerationMode;
    use async_trait::async_trait;
    use clap::Parser;
    use std::collections::VecDeque;
    use std::fs;
    use std::num::NonZeroUsize;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    enum Reply {
        Ack,
        Garbage,
        Reject,
    }

    /// Answers submissions from a script of replies, then acknowledges.
    struct FakeScheduler {
        replies: Mutex<VecDeque<Reply>>,
        submitted: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl FakeScheduler {
        fn new(replies: Vec<Reply>) -> (Self, Arc<Mutex<Vec<PathBuf>>>) {
            let submitted = Arc::new(Mutex::new(Vec::new()));
            (Self { replies: Mutex::new(replies.into()), submitted: submitted.clone() }, submitted)
        }
    }

    #[async_trait]
    impl Scheduler for FakeScheduler {
        async fn submit(&self, script: &Path) -> Result<String, SubmissionError> {
            let n = {
                let mut submitted = self.submitted.lock().unwrap();
                submitted.push(script.to_path_buf());
                submitted.len()
            };
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ack);
            match reply {
                Reply::Ack => Ok(format!("Submitted batch job {}\n", 100 + n)),
                Reply::Garbage => Ok("sbatch: queue is busy".to_string()),
                Reply::Reject => Err(SubmissionError::Rejected {
                    script: script.to_path_buf(),
                    code: Some(1),
                    stderr: "invalid account".to_string(),
                }),
            }
        }
    }

    fn job_config() -> JobConfig {
        JobConfig {
            time: Some("02:00:00".to_string()),
            mem: Some("8G".to_string()),
            cpus_per_task: Some(1),
            account: Some("lab0".to_string()),
            ..Default::default()
        }
    }

    fn settings(log_dir: &Path, delay_ms: u64) -> OrchestratorSettings {
        OrchestratorSettings {
            log_dir: log_dir.to_path_buf(),
            program: "clusterseeker".to_string(),
            submit_delay: Duration::from_millis(delay_ms),
            batch_size: NonZeroUsize::new(200).unwrap(),
        }
    }

    fn plan(tmp: &TempDir, dirs: usize) -> SubmissionPlan {
        let directories: Vec<PathBuf> = (1..=dirs)
            .map(|i| {
                let d = tmp.path().join(format!("folder{}", i));
                fs::create_dir_all(&d).unwrap();
                d
            })
            .collect();
        let output_dir = tmp.path().join("folder1/Seeker_Output");
        SubmissionPlan {
            batch_dir: output_dir.join("file_batches"),
            output_dir,
            directories,
            mode: EnumerationMode::LeafOnly,
        }
    }

    #[tokio::test]
    async fn test_all_jobs_accepted() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, submitted) = FakeScheduler::new(vec![]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();

        let report = orch.run(&plan(&tmp, 3)).await.unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(
            report.history,
            vec![
                RunState::Configured,
                RunState::PartitionsBuilt,
                RunState::ScanJobsSubmitting,
                RunState::ScanJobsSubmitted,
                RunState::MergeJobBuilt,
                RunState::MergeJobSubmitted,
                RunState::Done,
            ]
        );
        assert_eq!(report.records.iter().map(|r| r.job_id.as_str()).collect::<Vec<_>>(), ["101", "102", "103"]);
        assert_eq!(report.dependency.as_deref(), Some("afterok:101:102:103"));
        assert_eq!(report.merge.as_ref().map(|m| m.job_id.as_str()), Some("104"));
        assert!(report.ensure_success().is_ok());

        let submitted = submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 4);
        assert_eq!(submitted[3], logs.join("merge_and_process.sh"));

        let merge_script = fs::read_to_string(logs.join("merge_and_process.sh")).unwrap();
        assert!(merge_script.contains("#SBATCH --dependency=afterok:101:102:103\n"));
        assert!(merge_script.contains(" merge --input-dir "));

        let scan_script = fs::read_to_string(logs.join("dir_scan_2.sh")).unwrap();
        assert!(scan_script.contains("folder2"));
        assert!(scan_script.contains("subdirectories_2.txt"));
        assert!(scan_script.contains("--mode leaf"));
        assert!(!scan_script.contains("--dependency"));
    }

    #[tokio::test]
    async fn test_unparsable_and_rejected_units_are_left_out() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, _) = FakeScheduler::new(vec![Reply::Ack, Reply::Garbage, Reply::Reject, Reply::Ack]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();

        let report = orch.run(&plan(&tmp, 4)).await.unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.failed.iter().map(|f| f.index).collect::<Vec<_>>(), vec![2, 3]);
        assert!(report.failed[0].reason.contains("sbatch: queue is busy"));
        assert_eq!(report.dependency.as_deref(), Some("afterok:101:104"));
    }

    #[tokio::test]
    async fn test_no_accepted_jobs_means_no_merge() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, submitted) = FakeScheduler::new(vec![Reply::Reject, Reply::Garbage]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();

        let report = orch.run(&plan(&tmp, 2)).await.unwrap();

        assert_eq!(report.state, RunState::FailedNoJobs);
        assert!(report.merge.is_none());
        assert!(report.dependency.is_none());
        assert_eq!(submitted.lock().unwrap().len(), 2);
        assert!(!logs.join("merge_and_process.sh").exists());
        assert!(matches!(report.ensure_success(), Err(PipelineError::NoJobsSubmitted { attempted: 2 })));
    }

    #[tokio::test]
    async fn test_rejected_merge_fails_the_run() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, _) = FakeScheduler::new(vec![Reply::Ack, Reply::Reject]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();

        let report = orch.run(&plan(&tmp, 1)).await.unwrap();

        assert_eq!(report.state, RunState::FailedMerge);
        assert_eq!(report.records.len(), 1);
        assert!(matches!(report.ensure_success(), Err(PipelineError::MergeRejected { .. })));
    }

    #[tokio::test]
    async fn test_submissions_are_throttled() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, _) = FakeScheduler::new(vec![]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 20)).unwrap();

        let start = tokio::time::Instant::now();
        orch.run(&plan(&tmp, 3)).await.unwrap();
        // Three gaps: scan 1->2, scan 2->3, scan 3->merge
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_run_clears_stale_scan_outputs() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let p = plan(&tmp, 1);
        fs::create_dir_all(&p.output_dir).unwrap();
        fs::write(p.output_dir.join("subdirectories_9.txt"), "/old\n").unwrap();

        let (scheduler, _) = FakeScheduler::new(vec![]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();
        orch.run(&p).await.unwrap();
        assert!(!p.output_dir.join("subdirectories_9.txt").exists());
    }

    #[test]
    fn test_incomplete_job_config_fails_before_any_side_effect() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let cfg = JobConfig { mem: None, cpus_per_task: None, ..job_config() };
        let (scheduler, submitted) = FakeScheduler::new(vec![]);

        let err = Orchestrator::new(scheduler, &cfg, settings(&logs, 0)).err().unwrap();
        match err {
            ConfigError::MissingRequired(fields) => assert_eq!(fields, vec!["mem", "cpus_per_task"]),
            other => panic!("unexpected error: {}", other),
        }
        assert!(submitted.lock().unwrap().is_empty());
        assert!(!logs.exists());
    }

    #[tokio::test]
    async fn test_report_is_persisted_as_json() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let (scheduler, _) = FakeScheduler::new(vec![]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), settings(&logs, 0)).unwrap();
        let report = orch.run(&plan(&tmp, 2)).await.unwrap();

        let path = report.persist(&logs).unwrap();
        assert_eq!(path, logs.join(format!("submission_{}.json", report.run_id)));
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["state"], "Done");
        assert_eq!(json["records"].as_array().unwrap().len(), 2);
        assert_eq!(json["dependency"], "afterok:101:102");
    }

    #[test]
    fn test_state_transitions() {
        assert!(RunState::Configured.can_transition_to(RunState::PartitionsBuilt));
        assert!(RunState::ScanJobsSubmitting.can_transition_to(RunState::FailedNoJobs));
        assert!(RunState::MergeJobBuilt.can_transition_to(RunState::FailedMerge));
        assert!(!RunState::Configured.can_transition_to(RunState::Done));
        assert!(!RunState::ScanJobsSubmitted.can_transition_to(RunState::FailedNoJobs));
        assert!(!RunState::Done.can_transition_to(RunState::Configured));
        assert!(RunState::FailedMerge.is_terminal());
        assert!(!RunState::MergeJobBuilt.is_terminal());
    }

    #[test]
    fn test_prepare_plan_skips_invalid_and_duplicate_folders() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        let folders = vec![
            a.to_string_lossy().to_string(),
            tmp.path().join("missing").to_string_lossy().to_string(),
            String::new(),
            a.to_string_lossy().to_string(),
            b.to_string_lossy().to_string(),
        ];

        let plan = prepare_plan(&folders, EnumerationMode::Full, None, &AppConfig::default()).unwrap();
        assert_eq!(plan.directories, vec![a.clone(), b]);
        assert_eq!(plan.output_dir, a.join("Seeker_Output"));
        assert_eq!(plan.batch_dir, a.join("Seeker_Output/file_batches"));
        assert_eq!(plan.mode, EnumerationMode::Full);
    }

    #[test]
    fn test_prepare_plan_without_valid_folders() {
        let tmp = TempDir::new().unwrap();
        let folders = vec![tmp.path().join("nope").to_string_lossy().to_string()];
        let err = prepare_plan(&folders, EnumerationMode::LeafOnly, None, &AppConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidDirectories));
    }

    #[test]
    fn test_submit_batch_size_flag_overrides_config() {
        let cli = Cli::try_parse_from([
            "clusterseeker",
            "submit",
            "--config",
            "job.json",
            "--folder",
            "/data/a",
            "--mode",
            "leaf",
            "--batch-size",
            "1000",
        ])
        .unwrap();
        let Commands::Submit { batch_size, .. } = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(batch_size, Some(1000));

        let cfg = AppConfig::default();
        let overridden = OrchestratorSettings::from_config(&cfg, batch_size).unwrap();
        assert_eq!(overridden.batch_size.get(), 1000);
        assert_eq!(OrchestratorSettings::from_config(&cfg, None).unwrap().batch_size.get(), 200);
        assert!(matches!(
            OrchestratorSettings::from_config(&cfg, Some(0)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_merge_script_carries_batch_size() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("slurm_logs");
        let mut s = settings(&logs, 0);
        s.batch_size = NonZeroUsize::new(1000).unwrap();
        let (scheduler, _) = FakeScheduler::new(vec![]);
        let mut orch = Orchestrator::new(scheduler, &job_config(), s).unwrap();

        orch.run(&plan(&tmp, 1)).await.unwrap();

        let merge_script = fs::read_to_string(logs.join("merge_and_process.sh")).unwrap();
        assert!(merge_script.contains("--batch-size 1000"));
    }
}
