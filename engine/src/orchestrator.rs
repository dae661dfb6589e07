//! Extension orchestrator.
//!
//! Owns the session collection and drives the lifecycle
//! `Stopped → Starting → Running → Stopping → Stopped`. Every restart
//! rebuilds the collection from a fresh discovery pass; nothing is diffed.
//!
//! All mutation happens on the task that owns the orchestrator. Lock-file
//! watchers and the host feed it through [`OrchestratorEvent`]s, and
//! [`Orchestrator::run`] processes them one at a time.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::mpsc;

use biome_monorepo_discovery as discovery;
use biome_monorepo_lsp::{
    DiagnosticsSnapshot, DiagnosticsStore, FIX_ALL_ACTION, LspEvent, OutputChannel, Session,
    SessionContext, SessionId,
};
use biome_monorepo_types::{
    BinaryLocation, EXTENSION_NAME, Installation, ToolVersion, language_for_path,
};

use crate::commands::{Command, palette_items};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::EditorHost;
use crate::status::{StatusGlyph, StatusItem};
use crate::watcher::LockFileWatcher;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const LSP_EVENT_CHANNEL_CAPACITY: usize = 256;

static INSTANCE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the single orchestrator slot.
#[derive(Debug)]
struct InstanceGuard;

impl InstanceGuard {
    fn claim() -> Result<Self, EngineError> {
        INSTANCE_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| EngineError::AlreadyRunning)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        INSTANCE_ACTIVE.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Inputs to the control loop.
#[derive(Debug)]
pub enum OrchestratorEvent {
    WorkspaceFoldersChanged(Vec<PathBuf>),
    LockFileChanged(PathBuf),
    Command(Command),
    DocumentOpened { path: PathBuf, text: String },
    DocumentChanged { path: PathBuf, text: String },
    DocumentClosed(PathBuf),
    Shutdown,
}

impl OrchestratorEvent {
    fn is_restart_trigger(&self) -> bool {
        matches!(
            self,
            Self::WorkspaceFoldersChanged(_)
                | Self::LockFileChanged(_)
                | Self::Command(Command::Restart)
        )
    }
}

#[derive(Debug, Clone)]
pub struct StartFailure {
    pub version: ToolVersion,
    pub binary: BinaryLocation,
    pub error: String,
}

/// Outcome of one start cycle. Failures never cancel sibling sessions.
#[derive(Debug, Clone, Default)]
pub struct StartReport {
    pub started: usize,
    pub failures: Vec<StartFailure>,
}

#[derive(Debug)]
pub struct OrchestratorOptions {
    pub config: EngineConfig,
    /// Workspace folders as the host reports them.
    pub folders: Vec<PathBuf>,
    /// Directory for output-channel log files.
    pub log_dir: Option<PathBuf>,
}

struct PhaseTimer {
    label: &'static str,
    started: Instant,
}

impl PhaseTimer {
    fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    fn finish(self, channel: &OutputChannel) {
        let ms = self.started.elapsed().as_secs_f64() * 1000.0;
        channel.info(&format!("{}: {ms:.2}ms", self.label));
    }
}

pub struct Orchestrator {
    _guard: InstanceGuard,
    config: EngineConfig,
    folders: Vec<PathBuf>,
    log_dir: Option<PathBuf>,
    channel: Arc<OutputChannel>,
    state: ExtensionState,
    sessions: Vec<Session>,
    watcher: Option<LockFileWatcher>,
    events_tx: mpsc::Sender<OrchestratorEvent>,
    events_rx: Option<mpsc::Receiver<OrchestratorEvent>>,
    lsp_tx: mpsc::Sender<LspEvent>,
    lsp_rx: mpsc::Receiver<LspEvent>,
    diagnostics: DiagnosticsStore,
    /// Open document → session it was routed to.
    documents: HashMap<PathBuf, SessionId>,
    restarts: u64,
}

impl Orchestrator {
    /// Claim the process-wide orchestrator slot. Nothing is started yet.
    pub fn new(options: OrchestratorOptions) -> Result<Self, EngineError> {
        let guard = InstanceGuard::claim()?;
        let OrchestratorOptions {
            config,
            folders,
            log_dir,
        } = options;

        let channel = Arc::new(OutputChannel::new(EXTENSION_NAME, log_dir.as_deref()));
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (lsp_tx, lsp_rx) = mpsc::channel(LSP_EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            _guard: guard,
            config,
            folders,
            log_dir,
            channel,
            state: ExtensionState::Stopped,
            sessions: Vec::new(),
            watcher: None,
            events_tx,
            events_rx: Some(events_rx),
            lsp_tx,
            lsp_rx,
            diagnostics: DiagnosticsStore::new(),
            documents: HashMap::new(),
            restarts: 0,
        })
    }

    #[must_use]
    pub fn state(&self) -> ExtensionState {
        self.state
    }

    #[must_use]
    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The extension-wide output channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<OutputChannel> {
        &self.channel
    }

    /// Sender for feeding the control loop.
    #[must_use]
    pub fn events(&self) -> mpsc::Sender<OrchestratorEvent> {
        self.events_tx.clone()
    }

    /// Number of restarts performed so far.
    #[must_use]
    pub fn restart_count(&self) -> u64 {
        self.restarts
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    #[must_use]
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Session serving an open document.
    #[must_use]
    pub fn session_for(&self, path: &Path) -> Option<&Session> {
        let id = self.documents.get(path)?;
        self.sessions.iter().find(|s| s.id() == *id)
    }

    pub async fn start<H: EditorHost>(&mut self, host: &H) -> StartReport {
        if self.state != ExtensionState::Stopped {
            tracing::debug!("start() ignored in state {:?}", self.state);
            return StartReport::default();
        }
        self.state = ExtensionState::Starting;
        self.channel.info("Starting extension...");
        host.set_status(Some(&StatusItem::new(StatusGlyph::Loading)));

        let report = if self.folders.is_empty() {
            self.channel.error("No workspace folder found.");
            StartReport::default()
        } else {
            self.register_listeners().await;
            self.warn_pnp_folders().await;
            self.sessions = self.create_sessions().await;
            self.start_sessions().await
        };

        let glyph = if report.started > 0 {
            StatusGlyph::Ready
        } else {
            StatusGlyph::Idle
        };
        host.set_status(Some(&StatusItem::new(glyph)));
        self.state = ExtensionState::Running;
        self.channel.info(&format!(
            "Extension started with {} running session(s).",
            report.started
        ));
        report
    }

    /// Stop every session and dispose the watchers. Safe to call repeatedly.
    pub async fn stop<H: EditorHost>(&mut self, host: &H) {
        if self.state == ExtensionState::Stopped {
            return;
        }
        self.state = ExtensionState::Stopping;
        self.channel.info("Stopping extension...");

        self.watcher = None;
        join_all(self.sessions.iter_mut().map(Session::stop)).await;
        self.sessions.clear();
        self.diagnostics.clear();
        self.documents.clear();
        // Anything still queued belongs to sessions that no longer exist.
        while self.lsp_rx.try_recv().is_ok() {}

        host.publish_diagnostics(&DiagnosticsSnapshot::default());
        host.set_status(None);
        self.state = ExtensionState::Stopped;
        self.channel.info("Extension stopped.");
    }

    /// `stop()` then `start()`. Documents open before the restart are re-sent
    /// from disk to whichever new session serves them.
    pub async fn restart<H: EditorHost>(&mut self, host: &H) -> StartReport {
        self.channel.info("Restarting extension...");
        self.restarts += 1;
        let reopen: Vec<PathBuf> = self.documents.keys().cloned().collect();

        self.stop(host).await;
        let report = self.start(host).await;

        for path in reopen {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    if let Err(e) = self.open_document(&path, &text).await {
                        tracing::debug!("Could not reopen {}: {e:#}", path.display());
                    }
                }
                Err(e) => tracing::debug!("Could not reread {}: {e}", path.display()),
            }
        }
        report
    }

    async fn register_listeners(&mut self) {
        let roots = self.folders.clone();
        let names = self.config.discovery.lock_files.clone();
        let lock_files = match tokio::task::spawn_blocking(move || {
            discovery::find_lock_files(&roots, &names)
        })
        .await
        {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => {
                self.channel.warn(&format!("Invalid lock file name: {e}"));
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Lock file scan panicked: {e}");
                Vec::new()
            }
        };

        if lock_files.is_empty() {
            self.channel.debug("No lock files to watch.");
            return;
        }

        match LockFileWatcher::new(
            &lock_files,
            self.config.watch.debounce(),
            self.events_tx.clone(),
        ) {
            Ok(watcher) => {
                self.channel.info(&format!(
                    "Watching {} lock file(s) for changes.",
                    watcher.watched().len()
                ));
                self.watcher = Some(watcher);
            }
            Err(e) => self.channel.warn(&e.to_string()),
        }
    }

    async fn warn_pnp_folders(&self) {
        for folder in discovery::find_pnp_workspace_folders(&self.folders).await {
            self.channel.warn(&format!(
                "{} uses Yarn Plug'n'Play. Biome can only be found through node_modules.",
                folder.display()
            ));
        }
    }

    async fn discover(&self) -> Vec<Installation> {
        let timer = PhaseTimer::start("find all package.json");
        let roots = self.folders.clone();
        let manifests = tokio::task::spawn_blocking(move || discovery::find_manifests(&roots))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Manifest scan panicked: {e}");
                Vec::new()
            });
        timer.finish(&self.channel);
        self.channel.info(&format!(
            "Found {} project folder(s) in workspaces.",
            manifests.len()
        ));

        let timer = PhaseTimer::start("find all biome projects");
        let projects = discovery::find_biome_projects(&manifests).await;
        if projects.is_empty() {
            self.channel.warn("No biome project found.");
            return Vec::new();
        }
        timer.finish(&self.channel);
        self.channel.info(&format!(
            "Found {} biome project folder(s).",
            projects.len()
        ));

        let timer = PhaseTimer::start("find biome binaries");
        let packages = discovery::find_biome_packages_by_project(&projects).await;
        if packages.is_empty() {
            self.channel
                .warn("No biome package found in node_modules. Please install it.");
            return Vec::new();
        }

        let installations = join_all(packages.into_iter().map(|(path, projects)| async move {
            let (version, binary) = tokio::join!(
                discovery::get_version(&path),
                discovery::find_biome_binary(&path)
            );
            Installation::new(path, binary, version, projects)
        }))
        .await;

        for installation in &installations {
            if installation.binary().is_none() {
                self.channel.warn(&format!(
                    "No binary found for {}. It appears that node_modules is not properly installed. Please reinstall it.",
                    installation.path()
                ));
            }
        }
        timer.finish(&self.channel);

        installations
    }

    async fn create_sessions(&self) -> Vec<Session> {
        let installations = self.discover().await;
        let found = installations.len();

        let sessions: Vec<Session> = installations
            .into_iter()
            .filter_map(Installation::into_session_parts)
            .map(|(version, binary, projects)| Session::new(version, binary, projects))
            .collect();

        if found > 0 && sessions.is_empty() {
            self.channel
                .warn("No usable Biome binary found. No session will be started.");
        }
        for session in &sessions {
            tracing::debug!(
                session = %session.id(),
                version = %session.version(),
                projects = session.projects().len(),
                "Session planned"
            );
        }
        sessions
    }

    async fn start_sessions(&mut self) -> StartReport {
        let ctx = self.session_context();
        let results = join_all(self.sessions.iter_mut().map(|session| {
            let ctx = &ctx;
            async move {
                let result = session.start(ctx).await;
                (session.version().clone(), session.binary().clone(), result)
            }
        }))
        .await;

        let mut report = StartReport::default();
        for (version, binary, result) in results {
            match result {
                Ok(()) => report.started += 1,
                Err(e) => {
                    self.channel
                        .error(&format!("Failed to start Biome {version} ({binary}): {e:#}"));
                    report.failures.push(StartFailure {
                        version,
                        binary,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        for session in self.sessions.iter().filter(|s| s.is_running()) {
            if let Some(reported) = session.server_version()
                && reported != session.version().as_str()
            {
                tracing::debug!(
                    "Biome at {} reports {reported}, manifest says {}",
                    session.binary(),
                    session.version()
                );
            }
        }
        report
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            log_dir: self.log_dir.clone(),
            init_timeout: self.config.lsp.init_timeout(),
            shutdown_timeout: self.config.lsp.shutdown_timeout(),
            event_tx: self.lsp_tx.clone(),
            host_folders: self.folders.clone(),
        }
    }

    fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    /// Route a newly opened document to the first session that serves it.
    ///
    /// `Ok(None)` when the language is unsupported or no session claims the path.
    pub async fn open_document(&mut self, path: &Path, text: &str) -> Result<Option<SessionId>> {
        let Some(language) = language_for_path(path) else {
            return Ok(None);
        };
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.matches(language, path))
        else {
            tracing::trace!("No session serves {}", path.display());
            return Ok(None);
        };

        session.did_open(path, language, text).await?;
        let id = session.id();
        self.documents.insert(path.to_path_buf(), id);
        Ok(Some(id))
    }

    pub async fn change_document(&mut self, path: &Path, text: &str) -> Result<Option<SessionId>> {
        let Some(id) = self.documents.get(path).copied() else {
            return self.open_document(path, text).await;
        };
        let Some(language) = language_for_path(path) else {
            return Ok(None);
        };
        let Some(session) = self.session_mut(id) else {
            self.documents.remove(path);
            return self.open_document(path, text).await;
        };
        session.did_change(path, language, text).await?;
        Ok(Some(id))
    }

    pub async fn close_document(&mut self, path: &Path) -> Result<()> {
        let Some(id) = self.documents.remove(path) else {
            return Ok(());
        };
        if let Some(session) = self.session_mut(id) {
            session.did_close(path).await?;
        }
        Ok(())
    }

    /// `source.fixAll.biome` code actions for a document, opening it from disk if needed.
    pub async fn fix_all_actions(&mut self, path: &Path) -> Result<Value> {
        if !self.documents.contains_key(path) {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            self.open_document(path, &text).await?;
        }
        let Some(id) = self.documents.get(path).copied() else {
            bail!("{} is not served by any Biome session", path.display());
        };
        let Some(session) = self.session_mut(id) else {
            bail!("session {id} is gone");
        };
        session.code_actions(path, &[FIX_ALL_ACTION]).await
    }

    pub async fn execute_command<H: EditorHost>(&mut self, command: Command, host: &H) {
        let command = if command == Command::ShowCommands {
            match host.pick_command(&palette_items()).await {
                Some(picked) if picked != Command::ShowCommands => picked,
                _ => return,
            }
        } else {
            command
        };

        tracing::debug!("Executing {command}");
        match command {
            Command::Restart => {
                self.restart(host).await;
            }
            Command::ShowOutputChannel => host.show_output_channel(&self.channel),
            Command::ExecuteAutofix => self.autofix(host).await,
            Command::ShowCommands => {}
        }
    }

    async fn autofix<H: EditorHost>(&mut self, host: &H) {
        let Some(path) = host.active_document() else {
            self.channel.info("No active document to fix.");
            return;
        };
        match self.fix_all_actions(&path).await {
            Ok(actions) => host.execute_source_action(FIX_ALL_ACTION, &path, &actions),
            Err(e) => self
                .channel
                .warn(&format!("Autofix failed for {}: {e:#}", path.display())),
        }
    }

    /// Drain up to `budget` queued LSP events without waiting.
    pub async fn poll_lsp_events(&mut self, budget: usize) -> usize {
        let mut processed = 0;
        while processed < budget {
            let Ok(event) = self.lsp_rx.try_recv() else {
                break;
            };
            let _ = self.handle_lsp_event(event).await;
            processed += 1;
        }
        processed
    }

    /// Returns whether the diagnostics store changed.
    async fn handle_lsp_event(&mut self, event: LspEvent) -> bool {
        match event {
            LspEvent::Diagnostics {
                session,
                path,
                items,
            } => {
                if self.sessions.iter().any(|s| s.id() == session) {
                    self.diagnostics.update(session, path, items);
                    true
                } else {
                    tracing::trace!("Dropping diagnostics from retired session {session}");
                    false
                }
            }
            LspEvent::ServerStopped { session, reason } => {
                let running = self.state == ExtensionState::Running;
                let Some(s) = self.session_mut(session) else {
                    return false;
                };
                if !s.is_running() {
                    return false;
                }
                let version = s.version().clone();
                s.stop().await;
                if running {
                    self.channel
                        .warn(&format!("Biome {version} session {session} stopped: {reason}"));
                }
                self.diagnostics.clear_session(session);
                self.documents.retain(|_, id| *id != session);
                true
            }
        }
    }

    fn absorb_trigger(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::WorkspaceFoldersChanged(folders) => {
                self.channel.info(&format!(
                    "Workspace folders changed ({} folder(s)).",
                    folders.len()
                ));
                self.folders = folders;
            }
            OrchestratorEvent::LockFileChanged(path) => {
                self.channel
                    .info(&format!("Lock file changed: {}", path.display()));
            }
            _ => {}
        }
    }

    /// Process events until [`OrchestratorEvent::Shutdown`] or until every
    /// sender is gone, then stop.
    ///
    /// Restart triggers already queued behind the one being handled are
    /// folded into it, so a burst of changes costs one restart.
    pub async fn run<H: EditorHost>(&mut self, host: &H) {
        let Some(mut events) = self.events_rx.take() else {
            tracing::warn!("Orchestrator control loop is already running");
            return;
        };
        let mut backlog: VecDeque<OrchestratorEvent> = VecDeque::new();

        loop {
            let event = if let Some(event) = backlog.pop_front() {
                event
            } else {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    Some(lsp_event) = self.lsp_rx.recv() => {
                        if self.handle_lsp_event(lsp_event).await {
                            host.publish_diagnostics(&self.diagnostics.snapshot());
                        }
                        continue;
                    }
                }
            };

            if event.is_restart_trigger() {
                self.absorb_trigger(event);
                while let Ok(next) = events.try_recv() {
                    if next.is_restart_trigger() {
                        self.absorb_trigger(next);
                    } else {
                        backlog.push_back(next);
                    }
                }
                self.restart(host).await;
                continue;
            }

            match event {
                OrchestratorEvent::Command(command) => self.execute_command(command, host).await,
                OrchestratorEvent::DocumentOpened { path, text } => {
                    if let Err(e) = self.open_document(&path, &text).await {
                        tracing::warn!("didOpen for {} failed: {e:#}", path.display());
                    }
                }
                OrchestratorEvent::DocumentChanged { path, text } => {
                    if let Err(e) = self.change_document(&path, &text).await {
                        tracing::warn!("didChange for {} failed: {e:#}", path.display());
                    }
                }
                OrchestratorEvent::DocumentClosed(path) => {
                    if let Err(e) = self.close_document(&path).await {
                        tracing::warn!("didClose for {} failed: {e:#}", path.display());
                    }
                }
                OrchestratorEvent::Shutdown => break,
                OrchestratorEvent::WorkspaceFoldersChanged(_)
                | OrchestratorEvent::LockFileChanged(_) => {}
            }
        }

        self.stop(host).await;
        self.events_rx = Some(events);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("folders", &self.folders)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
