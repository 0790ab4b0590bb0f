use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{validation, ConfigError};
use crate::jobs::{EnvironmentSetup, ResourceRequest};
use crate::paths::MountRoots;

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub drive_root: String,
    pub network_root: String,
    /// Top-level folder name used to rebuild paths whose separators were lost.
    pub anchor: String,
    /// Rename scanned folders containing spaces before submission.
    pub rename_spaces: bool,
}

impl PathsConfig {
    pub fn roots(&self) -> MountRoots {
        MountRoots {
            drive_root: self.drive_root.clone(),
            network_root: self.network_root.clone(),
            anchor: self.anchor.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Extra glob patterns on top of the built-in excluded folder names.
    pub excludes: Vec<String>,
    pub progress_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub submit_command: String,
    pub submit_delay_ms: u64,
    pub log_dir: PathBuf,
    /// Program invoked by the rendered job scripts.
    pub executable: String,
    pub output_dir_name: String,
    pub batch_dir_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub scan: ScanConfig,
    pub batch: BatchConfig,
    pub orchestrator: OrchestratorConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

/// Embedded defaults -> `clusterseeker.toml` -> `CLUSTERSEEKER_CONFIG` -> env/.env
pub fn load() -> Result<AppConfig, ConfigError> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();
    let custom = std::env::var("CLUSTERSEEKER_CONFIG").ok().map(PathBuf::from);
    load_layers(custom.as_deref())
}

/// Same layering as [`load`], with `custom` in place of `CLUSTERSEEKER_CONFIG`.
pub fn load_layers(custom: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("clusterseeker").required(false));

    if let Some(path) = custom {
        builder = builder.add_source(::config::File::from(path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("CLUSTERSEEKER")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scan.excludes"),
    );

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.paths.drive_root.trim().is_empty() {
        return Err(invalid("paths.drive_root", "must not be empty"));
    }
    if !cfg.paths.network_root.starts_with('/') {
        return Err(invalid("paths.network_root", "must be an absolute path"));
    }
    if cfg.paths.anchor.trim().is_empty() {
        return Err(invalid("paths.anchor", "must not be empty"));
    }

    if cfg.scan.progress_interval == 0 {
        return Err(invalid("scan.progress_interval", "must be > 0"));
    }
    validation::validate_batch_size(cfg.batch.size)?;

    if cfg.orchestrator.submit_command.trim().is_empty() {
        return Err(invalid("orchestrator.submit_command", "must not be empty"));
    }
    if cfg.orchestrator.executable.trim().is_empty() {
        return Err(invalid("orchestrator.executable", "must not be empty"));
    }
    // Allowed, but submissions then go out back to back
    if cfg.orchestrator.submit_delay_ms == 0 {
        tracing::warn!("orchestrator.submit_delay_ms is 0; submissions will not be throttled");
    }
    for name in [&cfg.orchestrator.output_dir_name, &cfg.orchestrator.batch_dir_name] {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(invalid("orchestrator.output_dir_name/batch_dir_name", "must be a plain folder name"));
        }
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid { field: field.to_string(), message: message.to_string() }
}

/// `module` may be a single name or a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ModuleList {
    One(String),
    Many(Vec<String>),
}

impl ModuleList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ModuleList::One(m) => vec![m],
            ModuleList::Many(ms) => ms,
        }
    }
}

/// Resource overrides applied to the merge job only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeOverrides {
    pub time: Option<String>,
    pub mem: Option<String>,
    pub cpus_per_task: Option<u32>,
}

/// Scheduler resource document, read from the `--config` JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobConfig {
    pub account: Option<String>,
    pub partition: Option<String>,
    pub time: Option<String>,
    pub mem: Option<String>,
    pub cpus_per_task: Option<u32>,
    pub ntasks_per_node: Option<u32>,
    #[serde(rename = "mail-user")]
    pub mail_user: Option<String>,
    pub conda_env: Option<String>,
    pub conda_lib_path: Option<String>,
    pub project_directory: Option<String>,
    pub module: Option<ModuleList>,
    pub merge: Option<MergeOverrides>,
}

impl JobConfig {
    pub const REQUIRED: [&'static str; 3] = ["time", "mem", "cpus_per_task"];

    /// Reads and validates a JSON job configuration.
    pub fn load(path: &Path) -> Result<JobConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let source = ::config::File::from(path).format(::config::FileFormat::Json);
        let job_cfg: JobConfig = ::config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| ConfigError::Malformed { path: path.to_path_buf(), reason: e.to_string() })?;
        job_cfg.validate()?;
        Ok(job_cfg)
    }

    /// Fails with every missing required key at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = [
            self.time.as_deref().is_some_and(|t| !t.trim().is_empty()),
            self.mem.as_deref().is_some_and(|m| !m.trim().is_empty()),
            self.cpus_per_task.is_some(),
        ];
        let missing: Vec<String> = Self::REQUIRED
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing));
        }
        if self.cpus_per_task == Some(0) {
            return Err(invalid("cpus_per_task", "must be > 0"));
        }
        Ok(())
    }

    /// Resources for a scan job.
    pub fn resources(&self) -> Result<ResourceRequest, ConfigError> {
        self.validate()?;
        Ok(ResourceRequest {
            time: self.time.clone().unwrap_or_default(),
            mem: self.mem.clone().unwrap_or_default(),
            cpus_per_task: self.cpus_per_task.unwrap_or(1),
            ntasks_per_node: self.ntasks_per_node,
            partition: self.partition.clone(),
            account: self.account.clone(),
            mail_user: self.mail_user.clone(),
        })
    }

    /// Resources for the merge job: scan resources with `merge` overrides.
    pub fn merge_resources(&self) -> Result<ResourceRequest, ConfigError> {
        let mut resources = self.resources()?;
        if let Some(overrides) = &self.merge {
            if let Some(time) = &overrides.time {
                resources.time = time.clone();
            }
            if let Some(mem) = &overrides.mem {
                resources.mem = mem.clone();
            }
            if let Some(cpus) = overrides.cpus_per_task {
                if cpus == 0 {
                    return Err(invalid("merge.cpus_per_task", "must be > 0"));
                }
                resources.cpus_per_task = cpus;
            }
        }
        Ok(resources)
    }

    pub fn environment(&self) -> EnvironmentSetup {
        EnvironmentSetup {
            modules: self.module.clone().map(ModuleList::into_vec).unwrap_or_default(),
            conda_env: self.conda_env.clone(),
            library_path: self.conda_lib_path.clone(),
        }
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.project_directory.as_ref().map(PathBuf::from)
    }
}
