//! Version Reader.

use biome_monorepo_types::{InstallationPath, ToolVersion};

/// Read the `version` field of an installation manifest, or `"unknown"`.
pub async fn get_version(installation: &InstallationPath) -> ToolVersion {
    let content = match tokio::fs::read(installation.manifest()).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Cannot read {installation}: {e}");
            return ToolVersion::unknown();
        }
    };

    serde_json::from_slice::<serde_json::Value>(&content)
        .ok()
        .and_then(|manifest| {
            manifest
                .get("version")
                .and_then(serde_json::Value::as_str)
                .map(ToolVersion::new)
        })
        .unwrap_or_else(ToolVersion::unknown)
}
