//! Yarn Plug'n'Play detection.
//!
//! PnP installs have no `node_modules`, so discovery can't resolve Biome in
//! them. The orchestrator uses this to say so instead of failing silently.

use std::path::{Path, PathBuf};

use crate::is_file;

const PNP_FILES: [&str; 2] = [".pnp.cjs", ".pnp.js"];

/// Nearest directory at or above `dir` that holds a PnP loader.
pub async fn find_pnp_root(dir: &Path) -> Option<PathBuf> {
    for ancestor in dir.ancestors() {
        for name in PNP_FILES {
            if is_file(&ancestor.join(name)).await {
                return Some(ancestor.to_path_buf());
            }
        }
    }
    None
}

/// Workspace folders that live inside a PnP install.
pub async fn find_pnp_workspace_folders(folders: &[PathBuf]) -> Vec<PathBuf> {
    let mut result = Vec::new();
    for folder in folders {
        if find_pnp_root(folder).await.is_some() {
            result.push(folder.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn finds_loader_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".pnp.cjs"), "").unwrap();
        let nested = dir.path().join("packages/a");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_pnp_root(&nested).await, Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn filters_pnp_folders() {
        let pnp = tempfile::tempdir().unwrap();
        fs::write(pnp.path().join(".pnp.js"), "").unwrap();
        let plain = tempfile::tempdir().unwrap();

        let folders = vec![pnp.path().to_path_buf(), plain.path().to_path_buf()];
        assert_eq!(
            find_pnp_workspace_folders(&folders).await,
            vec![pnp.path().to_path_buf()]
        );
    }
}
