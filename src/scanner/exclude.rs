use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;

/// Folder names never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".DS_Store",
    ".git",
    ".ipynb_checkpoints",
    "__pycache__",
    "AppData",
    "node_modules",
    ".venv",
    "AnaConda3",
    ".vscode",
];

/// Decides which directories the enumerator prunes.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    names: Vec<String>,
    globs: GlobSet,
}

impl ExclusionPolicy {
    pub fn new<S: AsRef<str>>(names: &[S], patterns: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            globs: build_globset(patterns)?,
        })
    }

    /// The built-in names plus the user's glob patterns.
    pub fn with_defaults(patterns: &[String]) -> Result<Self, ConfigError> {
        Self::new(DEFAULT_EXCLUDES, patterns)
    }

    /// True if any segment of `path` is an excluded name or a glob matches.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let s = path.to_string_lossy().replace('\\', "/");
        if s.split('/').any(|seg| self.names.iter().any(|n| n == seg)) {
            return true;
        }
        matches_excludes(&s, &self.globs)
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self { names: DEFAULT_EXCLUDES.iter().map(|n| n.to_string()).collect(), globs: GlobSet::empty() }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        if p.trim().is_empty() {
            continue;
        }
        // Patterns are matched against `/`-separated paths
        let norm = p.trim().replace('\\', "/");
        b.add(Glob::new(&norm)?);
    }
    b.build()
}

fn matches_excludes(normalized: &str, set: &GlobSet) -> bool {
    if set.is_empty() {
        return false;
    }
    set.is_match(normalized)
}
