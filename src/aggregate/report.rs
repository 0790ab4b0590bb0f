use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SeekerError;
use crate::types::FileMetadataRow;

use super::metadata::Extraction;

/// Longest table name spreadsheet tools accept.
pub const MAX_TABLE_NAME: usize = 31;
pub const NO_EXTENSION: &str = "No Extension";

const INVALID_TABLE_CHARS: &[char] = &['.', '/', '\\', ':', '*', '?', '[', ']', '<', '>', '|', '"'];

/// Device names Windows refuses as file stems, whatever the case.
const RESERVED_STEMS: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8", "com9", "lpt1",
    "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Column holding the extension key in every report table.
const EXTENSION_COLUMN: usize = 1;
const NAME_COLUMN: usize = 0;
const SIZE_COLUMN: usize = 2;
const PATH_COLUMN: usize = 6;

/// Where the tables of one report go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub all_files: PathBuf,
    pub extensions_dir: PathBuf,
}

impl ReportPaths {
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            all_files: dir.join(format!("{}_all_files.csv", stem)),
            extensions_dir: dir.join(format!("{}_extensions", stem)),
        }
    }

    /// Reports for `<out>/<batch_dir>/batch_<k>.txt` land in `<out>`.
    pub fn for_partition(partition_file: &Path) -> Self {
        let dir = partition_file.parent().map(reports_dir).unwrap_or_else(|| PathBuf::from("."));
        let stem = partition_file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        Self::in_dir(&dir, &stem)
    }

    /// `<stem>.csv` instead of `<stem>_all_files.csv`.
    fn flattened(mut self) -> Self {
        let name = self
            .all_files
            .file_name()
            .map(|n| n.to_string_lossy().replace("_all_files.csv", ".csv"))
            .unwrap_or_default();
        self.all_files.set_file_name(name);
        self
    }
}

/// Folder receiving the reports of the partitions in `batch_dir`.
pub fn reports_dir(batch_dir: &Path) -> PathBuf {
    batch_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Partition number of a `batch_<k>_all_files.csv` or `batch_<k>_extensions`
/// report entry.
pub fn report_partition_number(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix("batch_")?;
    let digits = rest.strip_suffix("_all_files.csv").or_else(|| rest.strip_suffix("_extensions"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Deletes every partition report in `dir`.
pub fn clear_partition_reports(dir: &Path) -> std::io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if report_partition_number(&path).is_none() {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    if removed > 0 {
        tracing::info!(dir = %dir.display(), count = removed, "Removed previous partition reports");
    }
    Ok(removed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub rows: usize,
    pub tables: usize,
}

/// Table name for an extension key.
pub fn table_name(extension_key: &str) -> String {
    let trimmed = extension_key.trim_start_matches('.');
    if trimmed.is_empty() {
        return NO_EXTENSION.to_string();
    }
    let replaced: String =
        trimmed.chars().map(|c| if INVALID_TABLE_CHARS.contains(&c) { '_' } else { c }).collect();
    let name = truncate(&replaced, MAX_TABLE_NAME);
    if RESERVED_STEMS.contains(&name.to_lowercase().as_str()) {
        return format!("{}_ext", name);
    }
    name
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Assigns each key a distinct table name, comparing names without regard
/// to case. Later keys get `_2`, `_3`, ... suffixes on collision.
pub fn assign_table_names<S: AsRef<str>>(keys: &[S]) -> Vec<(String, String)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let base = table_name(key.as_ref());
        let mut name = base.clone();
        let mut n = 2;
        while !used.insert(name.to_lowercase()) {
            let suffix = format!("_{}", n);
            name = format!("{}{}", truncate(&base, MAX_TABLE_NAME - suffix.len()), suffix);
            n += 1;
        }
        out.push((key.as_ref().to_string(), name));
    }
    out
}

/// Writes the "all files" table and one table per extension.
pub fn write_report(extraction: &Extraction, paths: &ReportPaths) -> Result<ReportSummary, SeekerError> {
    let headers = FileMetadataRow::headers(extraction.semantics);
    let records: Vec<Vec<String>> = extraction.rows.iter().map(FileMetadataRow::to_record).collect();
    write_tables(&headers, &records, paths)
}

fn write_tables(headers: &[String], records: &[Vec<String>], paths: &ReportPaths) -> Result<ReportSummary, SeekerError> {
    if let Some(parent) = paths.all_files.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_csv(&paths.all_files, headers, records.iter())?;

    if paths.extensions_dir.exists() {
        fs::remove_dir_all(&paths.extensions_dir)?;
    }
    fs::create_dir_all(&paths.extensions_dir)?;

    let mut groups: BTreeMap<&str, Vec<&Vec<String>>> = BTreeMap::new();
    for r in records {
        let key = r.get(EXTENSION_COLUMN).map(String::as_str).unwrap_or_default();
        groups.entry(key).or_default().push(r);
    }
    let keys: Vec<&str> = groups.keys().copied().collect();
    for (key, name) in assign_table_names(&keys) {
        let rows = groups.get(key.as_str()).map(Vec::as_slice).unwrap_or_default();
        write_csv(&paths.extensions_dir.join(format!("{}.csv", name)), headers, rows.iter().copied())?;
    }

    Ok(ReportSummary { rows: records.len(), tables: keys.len() })
}

fn write_csv<'a>(
    path: &Path,
    headers: &[String],
    records: impl Iterator<Item = &'a Vec<String>>,
) -> Result<(), SeekerError> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(headers)?;
    for r in records {
        w.write_record(r)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateSummary {
    pub reports: usize,
    pub total_files: usize,
    pub unique_names: usize,
    pub unique_paths: usize,
    pub duplicate_rows: usize,
}

/// Combines every `*_all_files.csv` in `report_dir` into
/// `dest/combined_files.csv` and lists files sharing a (name, size) pair in
/// `dest/duplicates.csv`, each with per-extension tables.
pub fn find_duplicates(report_dir: &Path, dest: &Path) -> Result<DuplicateSummary, SeekerError> {
    let mut reports: Vec<PathBuf> = fs::read_dir(report_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.to_string_lossy().ends_with("_all_files.csv"))
        .collect();
    reports.sort();

    let mut headers: Option<Vec<String>> = None;
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut combined = 0;
    for report in &reports {
        let mut r = match csv::Reader::from_path(report) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %report.display(), error = %e, "Skipping unreadable report");
                continue;
            }
        };
        let file_headers: Vec<String> = match r.headers() {
            Ok(h) => h.iter().map(str::to_string).collect(),
            Err(e) => {
                tracing::warn!(path = %report.display(), error = %e, "Skipping report with unreadable header");
                continue;
            }
        };
        let expected = headers.get_or_insert_with(|| file_headers.clone());
        if *expected != file_headers {
            tracing::warn!(path = %report.display(), "Report columns differ from the first report; skipping");
            continue;
        }
        combined += 1;
        for rec in r.records() {
            match rec {
                Ok(rec) if rec.len() == file_headers.len() => records.push(rec.iter().map(str::to_string).collect()),
                Ok(_) => tracing::warn!(path = %report.display(), "Skipping short row"),
                Err(e) => tracing::warn!(path = %report.display(), error = %e, "Skipping malformed row"),
            }
        }
    }
    let Some(headers) = headers else {
        return Err(SeekerError::Aggregation {
            path: report_dir.to_path_buf(),
            reason: "no *_all_files.csv reports found".to_string(),
        });
    };
    if headers.len() <= PATH_COLUMN {
        return Err(SeekerError::Aggregation {
            path: report_dir.to_path_buf(),
            reason: format!("expected at least {} columns, found {}", PATH_COLUMN + 1, headers.len()),
        });
    }

    write_tables(&headers, &records, &ReportPaths::in_dir(dest, "combined_files").flattened())?;

    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for r in &records {
        *counts.entry((r[NAME_COLUMN].as_str(), r[SIZE_COLUMN].as_str())).or_default() += 1;
    }
    let duplicates: Vec<Vec<String>> = records
        .iter()
        .filter(|r| counts.get(&(r[NAME_COLUMN].as_str(), r[SIZE_COLUMN].as_str())).copied().unwrap_or(0) > 1)
        .cloned()
        .collect();
    write_tables(&headers, &duplicates, &ReportPaths::in_dir(dest, "duplicates").flattened())?;

    let summary = DuplicateSummary {
        reports: combined,
        total_files: records.len(),
        unique_names: records.iter().map(|r| &r[NAME_COLUMN]).collect::<HashSet<_>>().len(),
        unique_paths: records.iter().map(|r| &r[PATH_COLUMN]).collect::<HashSet<_>>().len(),
        duplicate_rows: duplicates.len(),
    };
    tracing::info!(
        reports = summary.reports,
        total_files = summary.total_files,
        unique_names = summary.unique_names,
        unique_paths = summary.unique_paths,
        duplicate_rows = summary.duplicate_rows,
        "Duplicate search finished"
    );
    Ok(summary)
}
