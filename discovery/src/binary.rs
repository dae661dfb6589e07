//! Binary Locator: installation → platform-specific Biome executable.

use biome_monorepo_types::{BinaryLocation, InstallationPath, PlatformTarget};

use crate::is_file;
use crate::resolve::resolve_package_manifest;

/// Locate the Biome executable for the running platform.
///
/// `None` means the install is incomplete (or the platform unsupported); the
/// caller reports it and carries on.
pub async fn find_biome_binary(installation: &InstallationPath) -> Option<BinaryLocation> {
    match PlatformTarget::current() {
        Ok(target) => find_biome_binary_for(installation, &target).await,
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}

/// Locate the Biome executable for an explicit platform target.
///
/// The companion package is resolved relative to the installation manifest,
/// the same way `@biomejs/biome` itself would require it.
pub async fn find_biome_binary_for(
    installation: &InstallationPath,
    target: &PlatformTarget,
) -> Option<BinaryLocation> {
    let cli_manifest =
        match resolve_package_manifest(installation.manifest(), &target.package_name()).await {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("No {target} package for {installation}: {e}");
                return None;
            }
        };

    let binary = cli_manifest.parent()?.join(target.binary_name());
    if is_file(&binary).await {
        Some(BinaryLocation::new(binary))
    } else {
        tracing::debug!("Binary missing at {}", binary.display());
        None
    }
}
