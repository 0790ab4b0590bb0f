use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::scanner::write_path_list;
use crate::types::Partition;

/// Splits `items` into consecutive partitions of at most `size` items,
/// numbered from 1. Empty input yields no partitions.
pub fn partition<T: Clone>(items: &[T], size: NonZeroUsize) -> Vec<Partition<T>> {
    items
        .chunks(size.get())
        .enumerate()
        .map(|(i, chunk)| Partition { number: i + 1, items: chunk.to_vec(), file: None })
        .collect()
}

/// Removes repeated items, keeping the first occurrence of each.
pub fn dedup_preserving_order<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

pub fn partition_file_name(number: usize) -> String {
    format!("batch_{}.txt", number)
}

/// Sequence number of a `batch_<k>.txt` file.
pub fn partition_number(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("batch_")?.strip_suffix(".txt")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Persists `partitions` as `dir/batch_<k>.txt`, recording each file on its
/// partition. Partition files of a previous run in `dir` are deleted first.
pub fn write_partitions(dir: &Path, partitions: &mut [Partition<String>]) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let stale = list_partition_files(dir)?;
    if !stale.is_empty() {
        tracing::info!(dir = %dir.display(), count = stale.len(), "Removing previous partition files");
    }
    for f in stale {
        fs::remove_file(&f)?;
    }

    let mut written = Vec::with_capacity(partitions.len());
    for p in partitions.iter_mut() {
        let file = dir.join(partition_file_name(p.number));
        write_path_list(&file, &p.items)?;
        p.file = Some(file.clone());
        written.push(file);
    }
    tracing::info!(dir = %dir.display(), partitions = written.len(), "Wrote partition files");
    Ok(written)
}

/// `batch_<k>.txt` files in `dir`, ordered by `k`.
pub fn list_partition_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<(usize, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| partition_number(&p).map(|n| (n, p)))
        .collect();
    files.sort_by_key(|(n, _)| *n);
    Ok(files.into_iter().map(|(_, p)| p).collect())
}
