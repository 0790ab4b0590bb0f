use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::SeekerError;
use crate::scanner::read_path_list;
use crate::types::{FileMetadataRow, TimestampSemantics};

/// File rows gathered from one partition.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub rows: Vec<FileMetadataRow>,
    pub semantics: TimestampSemantics,
    /// Files encountered, including the ones that failed.
    pub files_seen: u64,
    pub failures: u64,
}

/// Reads the paths listed in `partition_file` and collects one row per file.
///
/// Only an unreadable partition file is an error; missing entries and stat
/// failures are logged and counted.
pub fn extract_metadata(partition_file: &Path) -> Result<Extraction, SeekerError> {
    let paths = read_path_list(partition_file).map_err(|e| SeekerError::Aggregation {
        path: partition_file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(extract_from_paths(&paths))
}

/// Listed directories are walked recursively without exclusions; listed
/// files produce a single row.
pub fn extract_from_paths<S: AsRef<str>>(paths: &[S]) -> Extraction {
    let mut ex = Extraction {
        rows: Vec::new(),
        semantics: TimestampSemantics::for_host(),
        files_seen: 0,
        failures: 0,
    };
    let mut seen: HashSet<String> = HashSet::new();

    for p in paths {
        let p = Path::new(p.as_ref());
        if p.is_file() {
            collect_file(p, &mut ex, &mut seen);
            continue;
        }
        if !p.is_dir() {
            tracing::warn!(path = %p.display(), "Listed path does not exist");
            ex.failures += 1;
            continue;
        }
        for item in WalkDir::new(p).follow_links(false) {
            match item {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => collect_file(entry.path(), &mut ex, &mut seen),
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!(path = %path, error = %e, "Failed to walk directory");
                    ex.failures += 1;
                }
            }
        }
    }
    ex
}

fn collect_file(path: &Path, ex: &mut Extraction, seen: &mut HashSet<String>) {
    let key = path.to_string_lossy().to_string();
    if !seen.insert(key.clone()) {
        return;
    }
    ex.files_seen += 1;
    let md = match fs::metadata(path) {
        Ok(md) => md,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read file metadata");
            ex.failures += 1;
            return;
        }
    };
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    ex.rows.push(FileMetadataRow {
        extension: extension_key(&name),
        name,
        size: md.len(),
        times: timestamps(&md),
        path: key,
    });
}

/// Lower-cased last suffix with its leading `.`, or an empty string.
/// A trailing `.` with nothing after it counts as no extension.
pub fn extension_key(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn to_utc(t: std::io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    t.ok().map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn timestamps(md: &fs::Metadata) -> [Option<DateTime<Utc>>; 3] {
    use std::os::unix::fs::MetadataExt;
    let changed = DateTime::from_timestamp(md.ctime(), md.ctime_nsec().clamp(0, 999_999_999) as u32);
    [to_utc(md.modified()), changed, to_utc(md.accessed())]
}

#[cfg(not(unix))]
fn timestamps(md: &fs::Metadata) -> [Option<DateTime<Utc>>; 3] {
    [to_utc(md.created()), to_utc(md.modified()), to_utc(md.accessed())]
}
