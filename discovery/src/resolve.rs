//! Node-style package resolution.
//!
//! Mirrors what `createRequire(root).resolve("<pkg>/package.json")` does for a
//! plain `node_modules` layout: look in `node_modules` of the root's directory
//! and of every ancestor, so hoisted dependencies are found, then resolve
//! symlinks so pnpm's store layout yields the real package location.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::is_file;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot find package '{package}' from {}", from.display())]
    NotFound { package: String, from: PathBuf },
    #[error("resolving real path of {}", path.display())]
    RealPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directories Node would search for packages required from a file in `dir`.
///
/// `node_modules` directories themselves are never given a nested
/// `node_modules/node_modules` candidate.
pub(crate) fn node_modules_paths(dir: &Path) -> Vec<PathBuf> {
    dir.ancestors()
        .filter(|ancestor| ancestor.file_name().is_none_or(|name| name != "node_modules"))
        .map(|ancestor| ancestor.join("node_modules"))
        .collect()
}

/// Resolve the manifest of `package` as seen from the file `from`.
///
/// `from` is a file path acting as the resolution root (for a project, its
/// `package.json`); lookup starts in its parent directory.
pub async fn resolve_package_manifest(from: &Path, package: &str) -> Result<PathBuf, ResolveError> {
    let start = from.parent().unwrap_or(from);

    for modules in node_modules_paths(start) {
        let candidate = modules.join(package).join("package.json");
        if !is_file(&candidate).await {
            continue;
        }
        let real = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|source| ResolveError::RealPath {
                path: candidate.clone(),
                source,
            })?;
        tracing::trace!(
            package,
            from = %from.display(),
            resolved = %real.display(),
            "Resolved package manifest"
        );
        return Ok(dunce::simplified(&real).to_path_buf());
    }

    Err(ResolveError::NotFound {
        package: package.to_string(),
        from: from.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join("package.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn node_modules_paths_skip_nested_node_modules() {
        let paths = node_modules_paths(Path::new("/repo/node_modules/pkg"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/repo/node_modules/pkg/node_modules"),
                PathBuf::from("/repo/node_modules"),
                PathBuf::from("/node_modules"),
            ]
        );
    }

    #[tokio::test]
    async fn resolves_hoisted_package_from_nested_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let installed = write_manifest(
            &root.join("node_modules/@biomejs/biome"),
            r#"{"version":"1.9.4"}"#,
        );
        let project = write_manifest(&root.join("packages/a"), "{}");

        let resolved = resolve_package_manifest(&project, "@biomejs/biome")
            .await
            .unwrap();
        assert_eq!(resolved, installed);
    }

    #[tokio::test]
    async fn nearest_installation_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        write_manifest(&root.join("node_modules/@biomejs/biome"), "{}");
        let local = write_manifest(&root.join("packages/a/node_modules/@biomejs/biome"), "{}");
        let project = write_manifest(&root.join("packages/a"), "{}");

        let resolved = resolve_package_manifest(&project, "@biomejs/biome")
            .await
            .unwrap();
        assert_eq!(resolved, local);
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_manifest(dir.path(), "{}");

        let err = resolve_package_manifest(&project, "@biomejs/biome")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_package_resolves_to_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let store = root.join("node_modules/.pnpm/@biomejs+biome@1.9.4/node_modules/@biomejs/biome");
        let real = write_manifest(&store, "{}");
        fs::create_dir_all(root.join("node_modules/@biomejs")).unwrap();
        std::os::unix::fs::symlink(&store, root.join("node_modules/@biomejs/biome")).unwrap();
        let project = write_manifest(&root, "{}");

        let resolved = resolve_package_manifest(&project, "@biomejs/biome")
            .await
            .unwrap();
        assert_eq!(resolved, real);
    }
}
