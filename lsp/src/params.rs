//! Initialize-parameter construction.
//!
//! The Biome proxy looks for `biome.json` in every advertised workspace
//! folder. When an editor opens a monorepo at its root, advertising the host's
//! folders makes every package fall back to the root configuration, so each
//! session advertises its own project directories instead.
//!
//! Construction is a chain of [`InitializeParamsFiller`]s: a decorator runs
//! first and the inner filler only fills what is still missing.

use std::path::PathBuf;

use biome_monorepo_types::ProjectDirectory;

use crate::protocol::{self, ClientInfo, InitializeParams, WorkspaceFolder};

pub trait InitializeParamsFiller: Send + Sync {
    fn fill(&self, params: &mut InitializeParams);
}

/// Base parameters as an unmodified client would send them.
///
/// `host_folders` are the folders the editor host reports.
#[derive(Debug, Clone, Default)]
pub struct DefaultParams {
    host_folders: Vec<PathBuf>,
}

impl DefaultParams {
    #[must_use]
    pub fn new(host_folders: Vec<PathBuf>) -> Self {
        Self { host_folders }
    }
}

impl InitializeParamsFiller for DefaultParams {
    fn fill(&self, params: &mut InitializeParams) {
        params.process_id.get_or_insert(std::process::id());
        params.client_info.get_or_insert_with(|| ClientInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        });
        if params.capabilities.is_null() {
            params.capabilities = protocol::client_capabilities();
        }
        if params.workspace_folders.is_none() {
            params.workspace_folders = Some(
                self.host_folders
                    .iter()
                    .filter_map(|dir| workspace_folder(&ProjectDirectory::new(dir.clone())))
                    .collect(),
            );
        }
        if params.root_uri.is_none() {
            params.root_uri = params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first())
                .map(|folder| folder.uri.clone());
        }
    }
}

/// Replaces the advertised workspace folders with a session's project directories.
pub struct WorkspaceFolderOverride<F> {
    projects: Vec<ProjectDirectory>,
    inner: F,
}

impl<F: InitializeParamsFiller> WorkspaceFolderOverride<F> {
    pub fn new(projects: Vec<ProjectDirectory>, inner: F) -> Self {
        Self { projects, inner }
    }
}

impl<F: InitializeParamsFiller> InitializeParamsFiller for WorkspaceFolderOverride<F> {
    fn fill(&self, params: &mut InitializeParams) {
        params.workspace_folders = Some(self.projects.iter().filter_map(workspace_folder).collect());
        self.inner.fill(params);
    }
}

/// Run a filler chain from empty parameters.
pub fn build_initialize_params(filler: &dyn InitializeParamsFiller) -> InitializeParams {
    let mut params = InitializeParams::default();
    filler.fill(&mut params);
    params
}

fn workspace_folder(project: &ProjectDirectory) -> Option<WorkspaceFolder> {
    match protocol::path_to_file_uri(project.path()) {
        Ok(uri) => Some(WorkspaceFolder {
            uri: uri.to_string(),
            name: project.name(),
        }),
        Err(e) => {
            tracing::warn!("Not advertising workspace folder: {e}");
            None
        }
    }
}
