//! Language client owning one Biome `lsp-proxy` child process.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use biome_monorepo_types::ProjectDirectory;

use crate::codec::{FrameReader, FrameWriter};
use crate::output::OutputChannel;
use crate::params::{InitializeParamsFiller, build_initialize_params};
use crate::protocol::{
    self, Incoming, InitializeResult, LogMessageParams, Notification, PublishDiagnosticsParams,
    Request, ServerInfo,
};
use crate::types::{LspEvent, ServerStopReason, SessionId};

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

/// Everything needed to spawn and initialize one client.
pub(crate) struct ClientOptions {
    pub session: SessionId,
    pub binary: PathBuf,
    pub args: Vec<String>,
    /// Diagnostics for paths outside these directories are dropped.
    pub projects: Vec<ProjectDirectory>,
    pub params: Box<dyn InitializeParamsFiller>,
    pub channel: Arc<OutputChannel>,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub event_tx: mpsc::Sender<LspEvent>,
}

/// State shared by the reader task and unit tests.
struct Dispatch {
    session: SessionId,
    pending: PendingMap,
    event_tx: mpsc::Sender<LspEvent>,
    writer_tx: mpsc::Sender<WriterCommand>,
    channel: Arc<OutputChannel>,
    projects: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct OpenDocument {
    version: i32,
    lines: u32,
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for c in path.components() {
        match c {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

fn line_count(text: &str) -> u32 {
    u32::try_from(text.lines().count())
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

pub(crate) struct LanguageClient {
    session: SessionId,
    channel: Arc<OutputChannel>,
    child: Child,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    open_documents: HashMap<String, OpenDocument>,
    initialize_result: InitializeResult,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl LanguageClient {
    /// Spawn the server and complete the initialize handshake.
    ///
    /// On error the child is killed when the partially built client drops.
    pub async fn start(options: ClientOptions) -> Result<Self> {
        let ClientOptions {
            session,
            binary,
            args,
            projects,
            params,
            channel,
            request_timeout,
            shutdown_timeout,
            event_tx,
        } = options;

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", binary.display()))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;
        if let Some(stderr) = child.stderr.take() {
            let stderr_channel = channel.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stderr_channel.trace(&line);
                }
            });
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_channel = channel.clone();
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            writer_channel.warn(&format!("Write to server failed: {e}"));
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let dispatch = Dispatch {
            session,
            pending: pending.clone(),
            event_tx: event_tx.clone(),
            writer_tx: writer_tx.clone(),
            channel: channel.clone(),
            projects: projects.iter().map(|p| normalize_path(p.path())).collect(),
        };
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(stdout);
            let reason = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => dispatch.dispatch_frame(&frame).await,
                    Ok(None) => break ServerStopReason::Exited,
                    Err(e) => break ServerStopReason::Failed(e.to_string()),
                }
            };
            match &reason {
                ServerStopReason::Exited => dispatch.channel.info("Server closed its output"),
                ServerStopReason::Failed(msg) => {
                    dispatch.channel.warn(&format!("Reading from server failed: {msg}"));
                }
            }
            // Wake anyone still waiting on a response.
            dispatch.pending.lock().await.clear();
            let _ = dispatch
                .event_tx
                .send(LspEvent::ServerStopped { session, reason })
                .await;
        });

        let mut client = Self {
            session,
            channel,
            child,
            writer_tx,
            next_id: 1,
            pending,
            open_documents: HashMap::new(),
            initialize_result: InitializeResult::default(),
            request_timeout,
            shutdown_timeout,
            reader_handle,
            writer_handle,
        };

        client.initialize(params.as_ref()).await?;

        Ok(client)
    }

    async fn initialize(&mut self, filler: &dyn InitializeParamsFiller) -> Result<()> {
        let params = build_initialize_params(filler);
        if let Some(folders) = &params.workspace_folders {
            let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
            self.channel
                .debug(&format!("Advertising workspace folders: {}", names.join(", ")));
        }
        let params = serde_json::to_value(&params).context("serializing initialize params")?;
        let response = self.send_request("initialize", Some(params)).await?;

        if let Some(error) = response.get("error") {
            bail!(
                "initialize failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }

        self.initialize_result =
            serde_json::from_value(response.get("result").cloned().unwrap_or(Value::Null))
                .unwrap_or_default();

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await?;

        Ok(())
    }

    /// `serverInfo` from the initialize result, if the server sent one.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.initialize_result.server_info.as_ref()
    }

    async fn send_request(&mut self, method: &'static str, params: Option<Value>) -> Result<Value> {
        self.send_request_within(method, params, self.request_timeout)
            .await
    }

    async fn send_request_within(
        &mut self,
        method: &'static str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if self.reader_handle.is_finished() {
            bail!("server for session {} is no longer running", self.session);
        }
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame =
            serde_json::to_value(Request::new(id, method, params)).context("serializing request")?;
        if self.writer_tx.send(WriterCommand::Send(frame)).await.is_err() {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("server exited before answering {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} timed out after {}ms", timeout.as_millis());
            }
        }
    }

    async fn send_notification(&self, method: &'static str, params: Option<Value>) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow!("writer channel closed"))
    }

    /// Send the full text of a document: `didOpen` the first time, `didChange` afterwards.
    pub async fn sync_document(&mut self, uri: &str, language_id: &str, text: &str) -> Result<()> {
        let lines = line_count(text);
        if let Some(doc) = self.open_documents.get_mut(uri) {
            doc.version += 1;
            doc.lines = lines;
            let params = protocol::did_change_params(uri, doc.version, text);
            self.send_notification("textDocument/didChange", Some(params))
                .await
        } else {
            self.open_documents
                .insert(uri.to_string(), OpenDocument { version: 1, lines });
            let params = protocol::did_open_params(uri, language_id, 1, text);
            self.send_notification("textDocument/didOpen", Some(params))
                .await
        }
    }

    /// `didClose`; unknown documents are ignored.
    pub async fn close_document(&mut self, uri: &str) -> Result<()> {
        if self.open_documents.remove(uri).is_none() {
            return Ok(());
        }
        self.send_notification("textDocument/didClose", Some(protocol::did_close_params(uri)))
            .await
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.open_documents.contains_key(uri)
    }

    /// Request code actions of the given kinds over a whole open document.
    pub async fn code_actions(&mut self, uri: &str, only: &[&str]) -> Result<Value> {
        let Some(doc) = self.open_documents.get(uri).copied() else {
            bail!("{uri} is not open in session {}", self.session);
        };
        let params = protocol::code_action_params(uri, doc.lines, only);
        let response = self
            .send_request("textDocument/codeAction", Some(params))
            .await?;
        if let Some(error) = response.get("error") {
            bail!(
                "codeAction failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Graceful shutdown: `shutdown` + `exit`, then kill if the process lingers.
    ///
    /// The `shutdown` answer and the process exit are each bounded by the
    /// shutdown timeout, never by the request timeout.
    pub async fn stop(mut self) {
        let exited_already = matches!(self.child.try_wait(), Ok(Some(_)));
        if !exited_already
            && let Ok(response) = self
                .send_request_within("shutdown", None, self.shutdown_timeout)
                .await
            && response.get("error").is_none()
        {
            let _ = self.send_notification("exit", None).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let exited = tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await;
        if exited.is_err() {
            self.channel.debug("Server didn't exit in time, killing");
            let _ = self.child.kill().await;
        }

        self.writer_handle.abort();
        self.reader_handle.abort();
    }
}

impl Dispatch {
    async fn dispatch_frame(&self, frame: &Value) {
        let Some(incoming) = protocol::classify(frame) else {
            tracing::trace!(session = %self.session, "Ignoring malformed JSON-RPC frame");
            return;
        };

        match incoming {
            Incoming::Response { id, body } => {
                let sender = self.pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            Incoming::ServerRequest { id, method, params } => {
                let response = self.answer_server_request(id, &method, params.as_ref());
                let _ = self.writer_tx.send(WriterCommand::Send(response)).await;
            }
            Incoming::Notification { method, params } => {
                self.handle_notification(&method, params).await;
            }
        }
    }

    /// The server blocks on some of its requests, so every one gets an answer.
    fn answer_server_request(&self, id: Value, method: &str, params: Option<&Value>) -> Value {
        match method {
            // No client-side settings: one `null` per requested section.
            "workspace/configuration" => {
                let count = params
                    .and_then(|p| p.get("items"))
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                protocol::success_response(id, Value::Array(vec![Value::Null; count]))
            }
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create" => protocol::success_response(id, Value::Null),
            _ => {
                tracing::debug!(session = %self.session, "Server request {method} not supported");
                protocol::error_response(
                    id,
                    protocol::METHOD_NOT_FOUND,
                    &format!("Method not found: {method}"),
                )
            }
        }
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            "textDocument/publishDiagnostics" => {
                let Some(params) = params else { return };
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(diag_params) => self.publish_diagnostics(diag_params).await,
                    Err(e) => {
                        tracing::debug!(session = %self.session, "Bad publishDiagnostics: {e}");
                    }
                }
            }
            "window/logMessage" | "window/showMessage" => {
                let Some(params) = params else { return };
                if let Ok(log) = serde_json::from_value::<LogMessageParams>(params) {
                    match log.kind {
                        1 => self.channel.error(&log.message),
                        2 => self.channel.warn(&log.message),
                        3 => self.channel.info(&log.message),
                        _ => self.channel.debug(&log.message),
                    }
                }
            }
            _ => {
                tracing::trace!(session = %self.session, "Ignoring notification {method}");
            }
        }
    }

    async fn publish_diagnostics(&self, params: PublishDiagnosticsParams) {
        let Some(path) = protocol::file_uri_to_path(&params.uri) else {
            return;
        };
        let normalized = normalize_path(&path);
        if !self.projects.iter().any(|p| normalized.starts_with(p)) {
            self.channel.warn(&format!(
                "Dropping diagnostics for {} outside this session's projects",
                path.display()
            ));
            return;
        }
        let items = params
            .diagnostics
            .iter()
            .map(protocol::LspDiagnostic::to_biome_diagnostic)
            .collect();
        let _ = self
            .event_tx
            .send(LspEvent::Diagnostics {
                session: self.session,
                path,
                items,
            })
            .await;
    }
}
