use std::{
    cell::Cell,
    collections::HashSet,
    fs, io,
    path::{Component, Path, PathBuf},
};

use walkdir::WalkDir;

use crate::types::{DirectoryEntry, EnumerationMode};

mod exclude;

pub use exclude::{ExclusionPolicy, DEFAULT_EXCLUDES};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories visited (before leaf filtering).
    pub dirs: u64,
    pub warnings: u64,
    /// Excluded directories that were not descended into.
    pub pruned: u64,
}

#[derive(Debug, Clone)]
pub struct Enumeration {
    pub entries: Vec<DirectoryEntry>,
    pub summary: ScanSummary,
}

pub fn enumerate(root: &Path, policy: &ExclusionPolicy, mode: EnumerationMode) -> Enumeration {
    enumerate_with_progress(root, policy, mode, 0)
}

/// Walks `root` depth-first and returns its non-excluded directories.
///
/// Siblings are visited in file-name order, so two runs over an unchanged
/// tree return the same sequence. With `progress_interval > 0` an info event
/// is emitted every `progress_interval` directories.
pub fn enumerate_with_progress(
    root: &Path,
    policy: &ExclusionPolicy,
    mode: EnumerationMode,
    progress_interval: u64,
) -> Enumeration {
    let root = clean_root(root);
    let mut summary = ScanSummary::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<DirectoryEntry> = Vec::new();
    let pruned = Cell::new(0u64);

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if !e.file_type().is_dir() {
                return false;
            }
            if policy.is_excluded(e.path()) {
                pruned.set(pruned.get() + 1);
                return false;
            }
            true
        });

    for item in walker {
        let entry = match item {
            Ok(e) => e,
            Err(e) => {
                summary.warnings += 1;
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "Failed to read directory");
                continue;
            }
        };
        summary.dirs += 1;
        if progress_interval > 0 && summary.dirs % progress_interval == 0 {
            tracing::info!(root = %root.display(), dirs = summary.dirs, "Enumeration progress");
        }
        let path = entry.path().to_string_lossy().to_string();
        if seen.insert(path.clone()) {
            entries.push(DirectoryEntry::new(path));
        }
    }
    summary.pruned = pruned.get();

    if mode == EnumerationMode::LeafOnly {
        entries = leaf_only(entries);
    }
    tracing::debug!(
        root = %root.display(),
        mode = %mode,
        entries = entries.len(),
        warnings = summary.warnings,
        pruned = summary.pruned,
        "Enumeration finished"
    );
    Enumeration { entries, summary }
}

/// Drops every entry that is an ancestor of another entry.
pub fn leaf_only(entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    let mut ancestors: HashSet<PathBuf> = HashSet::new();
    for e in &entries {
        for a in e.as_path().ancestors().skip(1) {
            if !ancestors.insert(a.to_path_buf()) {
                // Everything above was inserted by an earlier entry
                break;
            }
        }
    }
    entries.into_iter().filter(|e| !ancestors.contains(e.as_path())).collect()
}

fn clean_root(root: &Path) -> PathBuf {
    let cleaned: PathBuf = root.components().filter(|c| !matches!(c, Component::CurDir)).collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Writes one path per line, creating parent directories as needed.
pub fn write_path_list<S: AsRef<str>>(path: &Path, lines: &[S]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    for l in lines {
        out.push_str(l.as_ref());
        out.push('\n');
    }
    fs::write(path, out)
}

/// Reads a path list, trimming lines and skipping blank ones.
pub fn read_path_list(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

/// Body of a scan job: enumerate `directory` and write the result to
/// `output_file`. The file is written even when nothing was found.
pub fn run_scan_job(
    directory: &Path,
    output_file: &Path,
    policy: &ExclusionPolicy,
    mode: EnumerationMode,
    progress_interval: u64,
) -> io::Result<ScanSummary> {
    if !directory.is_dir() {
        tracing::warn!(path = %directory.display(), "Scan target is not a directory");
    }
    let enumeration = enumerate_with_progress(directory, policy, mode, progress_interval);
    let lines: Vec<&str> = enumeration.entries.iter().map(|e| e.path.as_str()).collect();
    write_path_list(output_file, &lines)?;
    tracing::info!(
        directory = %directory.display(),
        output = %output_file.display(),
        entries = lines.len(),
        warnings = enumeration.summary.warnings,
        "Scan complete"
    );
    Ok(enumeration.summary)
}
