use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use clusterseeker::aggregate;
use clusterseeker::cli::{target_or_host, Cli, Commands};
use clusterseeker::config::{self, AppConfig, JobConfig};
use clusterseeker::error::validation;
use clusterseeker::jobs::SlurmScheduler;
use clusterseeker::orchestrator::{prepare_plan, Orchestrator, OrchestratorSettings};
use clusterseeker::paths::{self, MountConvention};
use clusterseeker::scanner::{self, ExclusionPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guards = clusterseeker::logging::init();
    let cli = Cli::parse();

    // Load configuration (embedded defaults -> clusterseeker.toml -> env/.env)
    let app_cfg = config::load().context("loading configuration")?;

    match cli.command {
        Commands::Submit { config, folders, mode, output_dir, batch_size } => {
            let job_cfg = JobConfig::load(&config)?;
            let settings = OrchestratorSettings::from_config(&app_cfg, batch_size)?;
            let log_dir = settings.log_dir.clone();
            let scheduler = SlurmScheduler::new(app_cfg.orchestrator.submit_command.clone());
            let mut orchestrator = Orchestrator::new(scheduler, &job_cfg, settings)?;

            let plan = prepare_plan(&folders, mode, output_dir, &app_cfg)?;
            let report = orchestrator.run(&plan).await?;
            let saved = report.persist(&log_dir).context("writing run report")?;
            info!(report = %saved.display(), "Run report written");
            report.ensure_success()?;
        }
        Commands::Scan { folder, output, mode } => {
            let policy = exclusion_policy(&app_cfg)?;
            let interval = app_cfg.scan.progress_interval;
            tokio::task::spawn_blocking(move || {
                scanner::run_scan_job(&folder, &output, &policy, mode, interval)
            })
            .await??;
        }
        Commands::Merge { input_dir, batch_dir, batch_size } => {
            let size = validation::validate_batch_size(batch_size.unwrap_or(app_cfg.batch.size))?;
            let summary =
                tokio::task::spawn_blocking(move || aggregate::merge_scan_outputs(&input_dir, &batch_dir, size))
                    .await??;
            info!(?summary, "Merge finished");
        }
        Commands::Extract { path } => {
            let summary = tokio::task::spawn_blocking(move || aggregate::process_partition(&path)).await??;
            info!(rows = summary.rows, tables = summary.tables, "Extraction finished");
        }
        Commands::Local { folders, mode, output_dir, batch_size } => {
            let size = validation::validate_batch_size(batch_size.unwrap_or(app_cfg.batch.size))?;
            let policy = exclusion_policy(&app_cfg)?;
            let plan = prepare_plan(&folders, mode, output_dir, &app_cfg)?;
            let interval = app_cfg.scan.progress_interval;
            let summary = tokio::task::spawn_blocking(move || {
                aggregate::run_local(
                    &plan.directories,
                    &policy,
                    plan.mode,
                    &plan.output_dir,
                    &plan.batch_dir,
                    size,
                    interval,
                )
            })
            .await??;
            info!(?summary, "Local run finished");
        }
        Commands::Normalize { path, to } => {
            let target: MountConvention = target_or_host(to);
            let normalized = paths::normalize(&path, target, &app_cfg.paths.roots());
            println!("{}", normalized.path);
        }
        Commands::RewriteLists { dir, to } => {
            let target = target_or_host(to);
            let roots = app_cfg.paths.roots();
            let written =
                tokio::task::spawn_blocking(move || paths::rewrite_path_lists(&dir, target, &roots)).await??;
            info!(files = written.len(), "Path lists rewritten");
        }
        Commands::Duplicates { dir, dest } => {
            let dest: PathBuf = dest.unwrap_or_else(|| dir.clone());
            let summary = tokio::task::spawn_blocking(move || aggregate::find_duplicates(&dir, &dest)).await??;
            info!(duplicates = summary.duplicate_rows, "Duplicate search written");
        }
    }

    Ok(())
}

/// Built-in names, configured globs and the tool's own output folder.
fn exclusion_policy(cfg: &AppConfig) -> anyhow::Result<ExclusionPolicy> {
    let mut patterns = cfg.scan.excludes.clone();
    patterns.push(format!("**/{}", cfg.orchestrator.output_dir_name));
    Ok(ExclusionPolicy::with_defaults(&patterns)?)
}
