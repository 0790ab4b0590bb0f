//! Translation between the drive-letter view (`Z:\...`) and the network
//! mount view (`/nfs/...`) of the same storage.
//!
//! Everything here is pure string work except [`rename_spaces_in_place`] and
//! [`rewrite_path_lists`], which touch the filesystem and log what they do.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Roots of the two conventions plus the folder used to rebuild
/// separator-less input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRoots {
    pub drive_root: String,
    pub network_root: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountConvention {
    /// `Z:\dir\sub`
    Drive,
    /// `/nfs/share/dir/sub`
    Network,
}

impl MountConvention {
    pub fn for_host() -> Self {
        if cfg!(windows) {
            MountConvention::Drive
        } else {
            MountConvention::Network
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPath {
    pub path: String,
    /// The input had lost its separators and was rebuilt around the anchor.
    pub reconstructed: bool,
}

impl NormalizedPath {
    fn plain(path: String) -> Self {
        Self { path, reconstructed: false }
    }
}

pub fn normalize(path: &str, target: MountConvention, roots: &MountRoots) -> NormalizedPath {
    match target {
        MountConvention::Drive => NormalizedPath::plain(to_drive(path, roots)),
        MountConvention::Network => to_network(path, roots),
    }
}

fn to_drive(path: &str, roots: &MountRoots) -> String {
    let network_root = roots.network_root.trim_end_matches('/');
    if let Some(rest) = strip_at_boundary(path, network_root) {
        let mut out = roots.drive_root.clone();
        out.push_str(rest);
        return out.replace('/', "\\");
    }
    path.replace('/', "\\")
}

fn to_network(path: &str, roots: &MountRoots) -> NormalizedPath {
    let Some(rest) = strip_prefix_ignore_case(path, &roots.drive_root) else {
        return NormalizedPath::plain(path.replace('\\', "/"));
    };

    let network_root = roots.network_root.trim_end_matches('/');
    if !rest.is_empty() && !rest.contains(['\\', '/']) {
        let rebuilt = reconstruct(rest, network_root, &roots.anchor);
        tracing::warn!(input = %path, output = %rebuilt, "Path had no separators; rebuilt it around the anchor folder");
        return NormalizedPath { path: rebuilt, reconstructed: true };
    }

    let joined = format!("{}/{}", network_root, rest.replace('\\', "/"));
    NormalizedPath::plain(tidy_slashes(&joined))
}

fn reconstruct(rest: &str, network_root: &str, anchor: &str) -> String {
    let mut parts = rest.split(anchor);
    let before = parts.next().unwrap_or_default();
    let after: Vec<&str> = parts.collect();
    let joined = if after.is_empty() {
        // Anchor missing; keep whatever text we got under the root.
        format!("{}/{}", network_root, before)
    } else {
        format!("{}/{}/{}", network_root, anchor, after.join("/"))
    };
    tidy_slashes(&joined)
}

/// Collapses repeated `/` and drops a trailing one.
fn tidy_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

fn strip_at_boundary<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn strip_prefix_ignore_case<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        path.get(prefix.len()..)
    } else {
        None
    }
}

/// Renames the last component of `path`, replacing spaces with `_`.
///
/// Returns the path to use from now on; unchanged when there is nothing to
/// rename or the rename failed (the failure is logged).
pub fn rename_spaces_in_place(path: &Path) -> PathBuf {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return path.to_path_buf();
    };
    if !name.contains(' ') {
        return path.to_path_buf();
    }
    let renamed = path.with_file_name(name.replace(' ', "_"));
    if renamed.exists() {
        tracing::warn!(from = %path.display(), to = %renamed.display(), "Rename target already exists; keeping original name");
        return path.to_path_buf();
    }
    match fs::rename(path, &renamed) {
        Ok(()) => {
            tracing::info!(from = %path.display(), to = %renamed.display(), "Renamed folder");
            renamed
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to rename folder");
            path.to_path_buf()
        }
    }
}

/// Folder [`rewrite_path_lists`] writes into, next to the source lists.
pub const REWRITE_DIR: &str = "slurm-ready";

/// Rewrites every `*.txt` path list in `dir` into `dir/slurm-ready/` with each
/// line normalized to `target`. Returns the files written.
pub fn rewrite_path_lists(
    dir: &Path,
    target: MountConvention,
    roots: &MountRoots,
) -> io::Result<Vec<PathBuf>> {
    let out_dir = dir.join(REWRITE_DIR);
    fs::create_dir_all(&out_dir)?;

    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == "txt"))
        .collect();
    sources.sort();

    let mut written = Vec::with_capacity(sources.len());
    for src in sources {
        let content = fs::read_to_string(&src)?;
        let mut out = String::with_capacity(content.len());
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            out.push_str(&normalize(line, target, roots).path);
            out.push('\n');
        }
        let Some(name) = src.file_name() else { continue };
        let dest = out_dir.join(name);
        fs::write(&dest, out)?;
        tracing::info!(from = %src.display(), to = %dest.display(), "Rewrote path list");
        written.push(dest);
    }
    Ok(written)
}
