//! Merge step: runs inside the merge job once every scan job succeeded.
//!
//! Scan outputs are concatenated and deduplicated, re-partitioned, and each
//! partition is turned into an "all files" table plus per-extension tables.

mod metadata;
mod report;

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::batch::{dedup_preserving_order, list_partition_files, partition, write_partitions};
use crate::error::SeekerError;
use crate::scanner::{read_path_list, run_scan_job, write_path_list, ExclusionPolicy};
use crate::types::EnumerationMode;

pub use metadata::{extension_key, extract_from_paths, extract_metadata, Extraction};
pub use report::{
    assign_table_names, clear_partition_reports, find_duplicates, report_partition_number, reports_dir,
    table_name, write_report, DuplicateSummary, ReportPaths, ReportSummary, MAX_TABLE_NAME, NO_EXTENSION,
};

/// Concatenated, deduplicated scan outputs, written into the batch directory.
pub const ALL_SUBDIRECTORIES: &str = "all_subdirectories.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub scan_outputs: usize,
    pub unreadable_outputs: usize,
    pub directories: usize,
    pub partitions: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Index of a `subdirectories_<i>.txt` scan output.
pub fn scan_output_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("subdirectories_")?.strip_suffix(".txt")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn list_scan_outputs(input_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut outputs: Vec<(usize, PathBuf)> = fs::read_dir(input_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| scan_output_index(&p).map(|i| (i, p)))
        .collect();
    outputs.sort_by_key(|(i, _)| *i);
    Ok(outputs.into_iter().map(|(_, p)| p).collect())
}

/// Deletes scan outputs left over from an earlier run in `dir`.
pub fn clear_scan_outputs(dir: &Path) -> std::io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let stale = list_scan_outputs(dir)?;
    for f in &stale {
        fs::remove_file(f)?;
    }
    if !stale.is_empty() {
        tracing::info!(dir = %dir.display(), count = stale.len(), "Removed previous scan outputs");
    }
    Ok(stale.len())
}

pub fn merge_scan_outputs(
    input_dir: &Path,
    batch_dir: &Path,
    batch_size: NonZeroUsize,
) -> Result<MergeSummary, SeekerError> {
    let outputs = list_scan_outputs(input_dir)?;
    let mut summary = MergeSummary { scan_outputs: outputs.len(), ..Default::default() };

    let mut lines = Vec::new();
    for out in &outputs {
        match read_path_list(out) {
            Ok(mut l) => lines.append(&mut l),
            Err(e) => {
                tracing::warn!(path = %out.display(), error = %e, "Skipping unreadable scan output");
                summary.unreadable_outputs += 1;
            }
        }
    }
    let directories = dedup_preserving_order(lines);
    summary.directories = directories.len();
    write_path_list(&batch_dir.join(ALL_SUBDIRECTORIES), &directories)?;

    let mut partitions = partition(&directories, batch_size);
    write_partitions(batch_dir, &mut partitions)?;
    clear_partition_reports(&reports_dir(batch_dir))?;
    summary.partitions = partitions.len();
    tracing::info!(
        input_dir = %input_dir.display(),
        scan_outputs = summary.scan_outputs,
        directories = summary.directories,
        partitions = summary.partitions,
        "Merged scan outputs"
    );

    for file in list_partition_files(batch_dir)? {
        match process_partition(&file) {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                tracing::warn!(partition = %file.display(), error = %e, "Partition failed");
                summary.failed += 1;
            }
        }
    }
    tracing::info!(succeeded = summary.succeeded, failed = summary.failed, "Processing complete");
    Ok(summary)
}

/// Extracts metadata for one partition file and writes its report.
pub fn process_partition(partition_file: &Path) -> Result<ReportSummary, SeekerError> {
    let extraction = extract_metadata(partition_file)?;
    let paths = ReportPaths::for_partition(partition_file);
    let summary = write_report(&extraction, &paths)?;
    tracing::info!(
        partition = %partition_file.display(),
        rows = summary.rows,
        tables = summary.tables,
        failures = extraction.failures,
        "Partition processed"
    );
    Ok(summary)
}

/// Runs scan and merge in-process for `folders`.
///
/// Scan outputs are written to `output_dir` exactly as scan jobs would write
/// them, so the merge step is the same one the cluster runs.
#[allow(clippy::too_many_arguments)]
pub fn run_local(
    folders: &[PathBuf],
    policy: &ExclusionPolicy,
    mode: EnumerationMode,
    output_dir: &Path,
    batch_dir: &Path,
    batch_size: NonZeroUsize,
    progress_interval: u64,
) -> Result<MergeSummary, SeekerError> {
    fs::create_dir_all(output_dir)?;
    clear_scan_outputs(output_dir)?;
    for (i, folder) in folders.iter().enumerate() {
        let output = output_dir.join(format!("subdirectories_{}.txt", i + 1));
        run_scan_job(folder, &output, policy, mode, progress_interval)?;
    }
    merge_scan_outputs(output_dir, batch_dir, batch_size)
}
