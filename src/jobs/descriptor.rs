use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SubmissionError;
use crate::types::{EnumerationMode, JobRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRequest {
    pub time: String,
    pub mem: String,
    pub cpus_per_task: u32,
    pub ntasks_per_node: Option<u32>,
    pub partition: Option<String>,
    pub account: Option<String>,
    pub mail_user: Option<String>,
}

/// Shell preamble run before the job command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentSetup {
    pub modules: Vec<String>,
    pub conda_env: Option<String>,
    pub library_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobCommand {
    Scan { directory: PathBuf, output_file: PathBuf, mode: EnumerationMode },
    Merge { input_dir: PathBuf, batch_dir: PathBuf, batch_size: usize },
}

impl JobCommand {
    /// Command line invoking `program` with this command's arguments.
    pub fn command_line(&self, program: &str) -> String {
        match self {
            JobCommand::Scan { directory, output_file, mode } => format!(
                "{} scan --folder {} --output {} --mode {}",
                program,
                shell_quote(&directory.to_string_lossy()),
                shell_quote(&output_file.to_string_lossy()),
                mode.as_arg()
            ),
            JobCommand::Merge { input_dir, batch_dir, batch_size } => format!(
                "{} merge --input-dir {} --batch-dir {} --batch-size {}",
                program,
                shell_quote(&input_dir.to_string_lossy()),
                shell_quote(&batch_dir.to_string_lossy()),
                batch_size
            ),
        }
    }
}

/// `afterok:<id>:<id>...` over accepted jobs, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyExpression {
    job_ids: Vec<String>,
}

impl DependencyExpression {
    /// `None` when there is nothing to depend on.
    pub fn from_records(records: &[JobRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self { job_ids: records.iter().map(|r| r.job_id.clone()).collect() })
    }

    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }
}

impl fmt::Display for DependencyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "afterok:{}", self.job_ids.join(":"))
    }
}

/// Everything needed to render one scheduler script.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub name: String,
    /// Scan job index; `None` for the merge job.
    pub index: Option<usize>,
    pub resources: ResourceRequest,
    pub environment: EnvironmentSetup,
    pub working_dir: Option<PathBuf>,
    pub log_file: PathBuf,
    pub dependency: Option<DependencyExpression>,
    pub program: String,
    pub command: JobCommand,
}

impl JobDescriptor {
    pub fn render(&self) -> String {
        let mut s = String::from("#!/bin/bash\n");
        let log = self.log_file.to_string_lossy();
        let r = &self.resources;

        // write! into a String cannot fail
        let _ = writeln!(s, "#SBATCH --job-name={}", self.name);
        let _ = writeln!(s, "#SBATCH --output={}", log);
        let _ = writeln!(s, "#SBATCH --error={}", log);
        let _ = writeln!(s, "#SBATCH --time={}", r.time);
        let _ = writeln!(s, "#SBATCH --mem={}", r.mem);
        let _ = writeln!(s, "#SBATCH --cpus-per-task={}", r.cpus_per_task);
        if let Some(n) = r.ntasks_per_node {
            let _ = writeln!(s, "#SBATCH --ntasks-per-node={}", n);
        }
        if let Some(dep) = &self.dependency {
            let _ = writeln!(s, "#SBATCH --dependency={}", dep);
        }
        if let Some(p) = &r.partition {
            let _ = writeln!(s, "#SBATCH --partition={}", p);
        }
        if let Some(a) = &r.account {
            let _ = writeln!(s, "#SBATCH --account={}", a);
        }
        if let Some(m) = &r.mail_user {
            let _ = writeln!(s, "#SBATCH --mail-user={}", m);
        }
        s.push('\n');

        let env = &self.environment;
        for m in &env.modules {
            let _ = writeln!(s, "module load {}", m);
        }
        if let Some(c) = &env.conda_env {
            s.push_str("source ~/.bashrc\n");
            let _ = writeln!(s, "conda activate {}", c);
        }
        if let Some(l) = &env.library_path {
            let _ = writeln!(s, "export LD_LIBRARY_PATH={}:$LD_LIBRARY_PATH", l);
        }
        if let Some(d) = &self.working_dir {
            let _ = writeln!(s, "cd {}", shell_quote(&d.to_string_lossy()));
        }
        s.push('\n');
        s.push_str(&self.command.command_line(&self.program));
        s.push('\n');
        s
    }

    pub fn write_script(&self, path: &Path) -> Result<(), SubmissionError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, self.render())
        };
        write().map_err(|source| SubmissionError::ScriptWrite { script: path.to_path_buf(), source })
    }
}

/// Single-quotes `s` for a POSIX shell when it contains anything unusual.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '=' | ','));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
