//! Discovery of Biome installations in a monorepo.
//!
//! The pipeline is strictly sequential: [`scan`] enumerates manifests,
//! [`packages`] keeps the ones that depend on Biome and groups them by the
//! installation they resolve to, then [`binary`] and [`version`] inspect each
//! installation. Every failure below the pipeline level degrades to "skip"
//! (or `None` / `"unknown"`): a monorepo legitimately contains many packages
//! that don't take part.

pub mod binary;
pub mod packages;
pub mod pnp;
pub mod resolve;
pub mod scan;
pub mod version;

pub use binary::{find_biome_binary, find_biome_binary_for};
pub use packages::{InstallationMap, find_biome_packages_by_project, find_biome_projects};
pub use pnp::{find_pnp_root, find_pnp_workspace_folders};
pub use resolve::{ResolveError, resolve_package_manifest};
pub use scan::{WorkspaceScan, find_lock_files, find_manifests};
pub use version::get_version;

use std::path::Path;

/// Whether `path` exists and is a regular file. Errors count as "no".
pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}
