//! Package Resolver: which manifests use Biome, and which installation each resolves to.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use biome_monorepo_types::{BIOME_PACKAGE, InstallationPath, ProjectDirectory};

use crate::is_file;
use crate::resolve::resolve_package_manifest;

/// Installation path → projects using it, in first-seen order.
pub type InstallationMap = IndexMap<InstallationPath, Vec<ProjectDirectory>>;

/// The subset of `package.json` discovery looks at.
///
/// Sections stay untyped: a section that is not an object declares nothing
/// but must not hide the others.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencySections {
    #[serde(default)]
    dependencies: Option<Value>,
    #[serde(default)]
    dev_dependencies: Option<Value>,
    #[serde(default)]
    peer_dependencies: Option<Value>,
}

impl DependencySections {
    fn declares(&self, package: &str) -> bool {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
        ]
        .into_iter()
        .flatten()
        .any(|section| {
            section
                .as_object()
                .is_some_and(|deps| deps.contains_key(package))
        })
    }
}

/// Keep the manifests that declare `@biomejs/biome` as a direct, dev or peer dependency.
///
/// Missing, unreadable and malformed manifests are skipped. Output follows
/// input order and is not deduplicated.
pub async fn find_biome_projects(manifests: &[PathBuf]) -> Vec<ProjectDirectory> {
    let mut projects = Vec::new();

    for manifest in manifests {
        if !is_file(manifest).await {
            continue;
        }
        let content = match tokio::fs::read(manifest).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Skipping unreadable manifest {}: {e}", manifest.display());
                continue;
            }
        };
        let sections: DependencySections = match serde_json::from_slice(&content) {
            Ok(sections) => sections,
            Err(e) => {
                tracing::debug!("Skipping malformed manifest {}: {e}", manifest.display());
                continue;
            }
        };
        if !sections.declares(BIOME_PACKAGE) {
            continue;
        }
        if let Some(project) = ProjectDirectory::from_manifest(manifest) {
            projects.push(project);
        }
    }

    projects
}

/// Group projects by the Biome installation their module resolution lands on.
///
/// Projects that fail to resolve contribute nothing.
pub async fn find_biome_packages_by_project(projects: &[ProjectDirectory]) -> InstallationMap {
    let mut installations = InstallationMap::new();

    for project in projects {
        match resolve_package_manifest(&project.manifest(), BIOME_PACKAGE).await {
            Ok(path) => {
                installations
                    .entry(InstallationPath::new(path))
                    .or_default()
                    .push(project.clone());
            }
            Err(e) => {
                tracing::debug!("Skipping project {project}: {e}");
            }
        }
    }

    installations
}
