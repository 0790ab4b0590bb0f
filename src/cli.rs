use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::paths::MountConvention;
use crate::types::EnumerationMode;

#[derive(Debug, Parser)]
#[command(name = "clusterseeker")]
#[command(about = "Inventory large directory trees with SLURM scan jobs and a dependent merge job", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit one scan job per folder plus a dependent merge job
    Submit {
        /// JSON job configuration (time, mem, cpus_per_task, ...)
        #[arg(long)]
        config: PathBuf,
        /// Folders to inventory, in either path convention
        #[arg(long = "folder", required = true, num_args = 1..)]
        folders: Vec<String>,
        #[arg(long, value_enum)]
        mode: EnumerationMode,
        /// Defaults to `<first folder>/Seeker_Output`
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Directories per merge partition; overrides `batch.size`
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// List the directories under one folder (scan job body)
    Scan {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_enum)]
        mode: EnumerationMode,
    },
    /// Merge scan outputs and build the per-batch reports (merge job body)
    Merge {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        batch_dir: PathBuf,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Build the report for a single batch file
    Extract {
        #[arg(long)]
        path: PathBuf,
    },
    /// Run scan and merge in this process, without a scheduler
    Local {
        #[arg(long = "folder", required = true, num_args = 1..)]
        folders: Vec<String>,
        #[arg(long, value_enum)]
        mode: EnumerationMode,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print a path converted to the other mount convention
    Normalize {
        path: String,
        /// Defaults to the convention of this host
        #[arg(long, value_enum)]
        to: Option<Target>,
    },
    /// Rewrite every path list in a folder into `slurm-ready/`
    RewriteLists {
        dir: PathBuf,
        #[arg(long, value_enum)]
        to: Option<Target>,
    },
    /// Combine batch reports and list files sharing name and size
    Duplicates {
        /// Folder holding the `*_all_files.csv` reports
        dir: PathBuf,
        /// Defaults to `dir`
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Drive,
    Network,
}

impl From<Target> for MountConvention {
    fn from(t: Target) -> Self {
        match t {
            Target::Drive => MountConvention::Drive,
            Target::Network => MountConvention::Network,
        }
    }
}

pub fn target_or_host(t: Option<Target>) -> MountConvention {
    t.map(MountConvention::from).unwrap_or_else(MountConvention::for_host)
}
