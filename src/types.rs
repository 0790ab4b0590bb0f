use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory discovered during enumeration.
///
/// The path is stored exactly as it was normalized by the enumerator; two
/// entries are the same entry when their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
}

impl DirectoryEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Which directories an enumeration reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    /// Every non-excluded directory, the root included.
    Full,
    /// Only directories without a descendant in the output.
    #[value(name = "leaf")]
    #[serde(rename = "leaf")]
    LeafOnly,
}

impl EnumerationMode {
    /// The value accepted by `--mode`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            EnumerationMode::Full => "full",
            EnumerationMode::LeafOnly => "leaf",
        }
    }
}

impl fmt::Display for EnumerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// A bounded group of work items with a 1-based sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<T> {
    pub number: usize,
    pub items: Vec<T>,
    /// Set once the partition has been written to disk.
    pub file: Option<PathBuf>,
}

impl<T> Partition<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A scheduler-assigned identifier for an accepted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    /// Position of the job in the submission run; `None` for the merge job.
    pub index: Option<usize>,
    pub name: String,
    pub script: PathBuf,
    /// Directory (or merge input) the job covers.
    pub unit: String,
}

/// Meaning of the three timestamp columns of a [`FileMetadataRow`].
///
/// Unix `stat` has no creation time at this layer, so the middle column holds
/// the inode status-change time there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampSemantics {
    CreatedModifiedAccessed,
    ModifiedChangedAccessed,
}

impl TimestampSemantics {
    pub fn for_host() -> Self {
        if cfg!(unix) {
            TimestampSemantics::ModifiedChangedAccessed
        } else {
            TimestampSemantics::CreatedModifiedAccessed
        }
    }

    pub fn headers(&self) -> [&'static str; 3] {
        match self {
            TimestampSemantics::CreatedModifiedAccessed => {
                ["Created Time", "Modified Time", "Accessed Time"]
            }
            TimestampSemantics::ModifiedChangedAccessed => {
                ["Modified Time", "Status Changed Time", "Accessed Time"]
            }
        }
    }
}

/// One file in the aggregated report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadataRow {
    pub name: String,
    /// Lower-cased suffix including the leading `.`, empty when there is none.
    pub extension: String,
    pub size: u64,
    /// Ordered as described by the batch's [`TimestampSemantics`].
    pub times: [Option<DateTime<Utc>>; 3],
    pub path: String,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl FileMetadataRow {
    /// Column headers for a table of rows carrying `semantics`.
    pub fn headers(semantics: TimestampSemantics) -> Vec<String> {
        let [t0, t1, t2] = semantics.headers();
        ["File Name", "File Extension", "File Size", t0, t1, t2, "File Path"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    pub fn to_record(&self) -> Vec<String> {
        let fmt_time = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.format(TIMESTAMP_FORMAT).to_string()).unwrap_or_default()
        };
        vec![
            self.name.clone(),
            self.extension.clone(),
            self.size.to_string(),
            fmt_time(&self.times[0]),
            fmt_time(&self.times[1]),
            fmt_time(&self.times[2]),
            self.path.clone(),
        ]
    }
}
