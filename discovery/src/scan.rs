//! Workspace scan: enumerate manifests and lock files under the workspace folders.
//!
//! Walks are blocking; async callers run them on the blocking pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

const MANIFEST_GLOB: &str = "**/package.json";
const EXCLUDE_GLOB: &str = "**/node_modules/**";

/// Compiled include/exclude patterns for one discovery pass.
#[derive(Debug, Clone)]
pub struct WorkspaceScan {
    manifests: GlobSet,
    lock_files: GlobSet,
    exclude: GlobSet,
}

impl WorkspaceScan {
    /// Build the scanner. `lock_file_names` are bare file names such as `yarn.lock`.
    pub fn new<S: AsRef<str>>(lock_file_names: &[S]) -> Result<Self, globset::Error> {
        let lock_glob = format!(
            "**/{{{}}}",
            lock_file_names
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(",")
        );
        Ok(Self {
            manifests: build_set(&[MANIFEST_GLOB])?,
            lock_files: build_set(&[lock_glob.as_str()])?,
            exclude: build_set(&[EXCLUDE_GLOB])?,
        })
    }

    /// Every `package.json` outside `node_modules`, in walk order, without duplicates.
    #[must_use]
    pub fn manifests(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        walk_matching(roots, &self.manifests, &self.exclude)
    }

    /// Every lock file outside `node_modules` that exists right now.
    #[must_use]
    pub fn lock_files(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        walk_matching(roots, &self.lock_files, &self.exclude)
    }
}

/// Convenience wrapper over [`WorkspaceScan::manifests`].
#[must_use]
pub fn find_manifests(roots: &[PathBuf]) -> Vec<PathBuf> {
    match WorkspaceScan::new(&biome_monorepo_types::LOCK_FILE_NAMES) {
        Ok(scan) => scan.manifests(roots),
        Err(e) => {
            tracing::warn!("Invalid built-in scan pattern: {e}");
            Vec::new()
        }
    }
}

/// Convenience wrapper over [`WorkspaceScan::lock_files`].
pub fn find_lock_files<S: AsRef<str>>(
    roots: &[PathBuf],
    names: &[S],
) -> Result<Vec<PathBuf>, globset::Error> {
    Ok(WorkspaceScan::new(names)?.lock_files(roots))
}

fn build_set(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn walk_matching(roots: &[PathBuf], include: &GlobSet, exclude: &GlobSet) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for root in roots {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !matches!(name.as_ref(), ".git" | "node_modules")
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry during scan: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let relative = relative_to(path, root);
            if !include.is_match(relative) || exclude.is_match(relative) {
                continue;
            }
            if seen.insert(path.to_path_buf()) {
                found.push(path.to_path_buf());
            }
        }
    }

    found
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
