//! One Biome language-server session per installation.
//!
//! A [`Session`] owns the projects that resolve to one `@biomejs/biome`
//! installation and, while started, the client talking to that
//! installation's `lsp-proxy`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::sync::mpsc;

use biome_monorepo_types::{BinaryLocation, DISPLAY_NAME, LSP_PROXY_ARG, ProjectDirectory, ToolVersion};

use crate::client::{ClientOptions, LanguageClient};
use crate::output::OutputChannel;
use crate::params::{DefaultParams, WorkspaceFolderOverride};
use crate::protocol;
use crate::selector::DocumentSelector;
use crate::types::{LspEvent, SessionId};

/// Code action kind that applies every safe Biome fix.
pub const FIX_ALL_ACTION: &str = "source.fixAll.biome";

/// Host-side settings shared by every session started in one cycle.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Directory for per-channel log files; `None` logs to tracing only.
    pub log_dir: Option<PathBuf>,
    pub init_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub event_tx: mpsc::Sender<LspEvent>,
    /// Folders the host has open. Never advertised to the server.
    pub host_folders: Vec<PathBuf>,
}

pub struct Session {
    id: SessionId,
    version: ToolVersion,
    binary: BinaryLocation,
    projects: Vec<ProjectDirectory>,
    selector: Option<DocumentSelector>,
    channel: Option<Arc<OutputChannel>>,
    client: Option<LanguageClient>,
}

impl Session {
    /// Describe a session. Nothing is spawned until [`Session::start`].
    #[must_use]
    pub fn new(version: ToolVersion, binary: BinaryLocation, projects: Vec<ProjectDirectory>) -> Self {
        Self {
            id: SessionId::next(),
            version,
            binary,
            projects,
            selector: None,
            channel: None,
            client: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn version(&self) -> &ToolVersion {
        &self.version
    }

    #[must_use]
    pub fn binary(&self) -> &BinaryLocation {
        &self.binary
    }

    #[must_use]
    pub fn projects(&self) -> &[ProjectDirectory] {
        &self.projects
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.client.is_some()
    }

    /// Name of this session's output channel.
    #[must_use]
    pub fn channel_name(&self) -> String {
        format!("{DISPLAY_NAME} ({}) - LSP", self.version)
    }

    /// The output channel, once the session has been started at least once.
    #[must_use]
    pub fn channel(&self) -> Option<&Arc<OutputChannel>> {
        self.channel.as_ref()
    }

    /// Spawn `<binary> lsp-proxy` and complete the initialize handshake.
    ///
    /// Errors are also written to the session's output channel. A session that
    /// is already running is left alone.
    pub async fn start(&mut self, ctx: &SessionContext) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let name = self.channel_name();
        let channel = self
            .channel
            .get_or_insert_with(|| Arc::new(OutputChannel::new(name, ctx.log_dir.as_deref())))
            .clone();

        match self.spawn_client(ctx, channel.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                channel.error(&format!("Failed to start session {}: {e:#}", self.id));
                Err(e)
            }
        }
    }

    async fn spawn_client(&mut self, ctx: &SessionContext, channel: Arc<OutputChannel>) -> Result<()> {
        let selector = DocumentSelector::for_projects(&self.projects)
            .context("building document selector")?;

        let folders: Vec<String> = self.projects.iter().map(ToString::to_string).collect();
        channel.info(&format!(
            "Starting {} from {} for {}",
            self.channel_name(),
            self.binary,
            folders.join(", ")
        ));

        let params = WorkspaceFolderOverride::new(
            self.projects.clone(),
            DefaultParams::new(ctx.host_folders.clone()),
        );

        let client = LanguageClient::start(ClientOptions {
            session: self.id,
            binary: self.binary.path().to_path_buf(),
            args: vec![LSP_PROXY_ARG.to_string()],
            projects: self.projects.clone(),
            params: Box::new(params),
            channel: channel.clone(),
            request_timeout: ctx.init_timeout,
            shutdown_timeout: ctx.shutdown_timeout,
            event_tx: ctx.event_tx.clone(),
        })
        .await
        .with_context(|| format!("starting {} {LSP_PROXY_ARG}", self.binary))?;

        let reported = client
            .server_info()
            .and_then(|info| info.version.as_deref())
            .unwrap_or("unknown");
        channel.info(&format!("Server ready, reports version {reported}"));

        self.selector = Some(selector);
        self.client = Some(client);
        Ok(())
    }

    /// Shut the server down. Does nothing when not running.
    pub async fn stop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        self.selector = None;
        client.stop().await;
        if let Some(channel) = &self.channel {
            channel.info("Server stopped");
        }
    }

    /// `serverInfo.version` from the initialize handshake.
    #[must_use]
    pub fn server_version(&self) -> Option<&str> {
        self.client
            .as_ref()?
            .server_info()?
            .version
            .as_deref()
    }

    /// Whether this running session serves `path` as `language`.
    #[must_use]
    pub fn matches(&self, language: &str, path: &Path) -> bool {
        self.selector
            .as_ref()
            .is_some_and(|selector| selector.matches(language, path))
    }

    /// Whether `path` is currently open in this session.
    #[must_use]
    pub fn has_open(&self, path: &Path) -> bool {
        let (Some(client), Ok(uri)) = (&self.client, protocol::path_to_file_uri(path)) else {
            return false;
        };
        client.is_open(uri.as_str())
    }

    pub async fn did_open(&mut self, path: &Path, language: &str, text: &str) -> Result<()> {
        let uri = protocol::path_to_file_uri(path)?;
        self.running_client()?
            .sync_document(uri.as_str(), language, text)
            .await
    }

    pub async fn did_change(&mut self, path: &Path, language: &str, text: &str) -> Result<()> {
        self.did_open(path, language, text).await
    }

    pub async fn did_close(&mut self, path: &Path) -> Result<()> {
        let uri = protocol::path_to_file_uri(path)?;
        self.running_client()?.close_document(uri.as_str()).await
    }

    /// Code actions of the given kinds for a whole open document.
    pub async fn code_actions(&mut self, path: &Path, only: &[&str]) -> Result<Value> {
        let uri = protocol::path_to_file_uri(path)?;
        self.running_client()?.code_actions(uri.as_str(), only).await
    }

    fn running_client(&mut self) -> Result<&mut LanguageClient> {
        let id = self.id;
        match self.client.as_mut() {
            Some(client) => Ok(client),
            None => bail!("session {id} is not running"),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("binary", &self.binary)
            .field("projects", &self.projects)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
