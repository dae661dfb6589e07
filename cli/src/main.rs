//! Terminal front end for the Biome monorepo engine.
//!
//! Reads line commands from stdin (see `help`), routes documents to the
//! session that owns them, and prints status and diagnostics as they change.

mod host;
mod input;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use biome_monorepo_engine::{
    Command, EngineConfig, Orchestrator, OrchestratorEvent, OrchestratorOptions, StartReport,
    config_dir,
};

use host::TerminalHost;
use input::{HELP, Line, resolve_path};

const LOG_FILE_NAME: &str = "biome-monorepo.log";
const INPUT_QUEUE: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "biome-monorepo", version, about)]
struct Args {
    /// Workspace folders to scan for Biome installations.
    #[arg(default_value = ".")]
    folders: Vec<PathBuf>,

    /// Config file to use instead of ~/.biome-monorepo/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for per-channel log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Returns the directory holding the process log, if one could be opened.
fn init_tracing() -> Option<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return log_path.parent().map(Path::to_path_buf);
    }

    // stdout carries the interactive session; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
    None
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.biome-monorepo/logs/biome-monorepo.log
    if let Some(dir) = config_dir() {
        candidates.push(dir.join("logs").join(LOG_FILE_NAME));
    }

    // Fallback: ./.biome-monorepo/logs/biome-monorepo.log
    candidates.push(
        PathBuf::from(".biome-monorepo")
            .join("logs")
            .join(LOG_FILE_NAME),
    );

    candidates
}

fn load_config(explicit: Option<&Path>) -> EngineConfig {
    let loaded = match explicit {
        Some(path) => EngineConfig::load_from(path).map(Some),
        None => EngineConfig::load(),
    };
    match loaded {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("{e}; using default settings");
            eprintln!("warning: {e}; using default settings");
            EngineConfig::default()
        }
    }
}

fn print_report(report: &StartReport) {
    println!("started {} session(s)", report.started);
    for failure in &report.failures {
        println!(
            "failed to start Biome {} ({}): {}",
            failure.version, failure.binary, failure.error
        );
    }
}

/// Blocking stdin reader on its own thread so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn read_document(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) => {
            println!("cannot read {}: {e}", path.display());
            None
        }
    }
}

async fn process_input(
    mut lines: mpsc::Receiver<String>,
    host: Arc<TerminalHost>,
    events: mpsc::Sender<OrchestratorEvent>,
    cwd: PathBuf,
) {
    while let Some(line) = lines.recv().await {
        let Some(line) = host.answer_pick(line) else {
            continue;
        };

        let event = match Line::parse(&line) {
            Line::Open(raw) => {
                let path = resolve_path(&cwd, raw);
                let Some(text) = read_document(&path).await else {
                    continue;
                };
                host.set_active(path.clone());
                OrchestratorEvent::DocumentOpened { path, text }
            }
            Line::Change(raw) => {
                let path = resolve_path(&cwd, raw);
                let Some(text) = read_document(&path).await else {
                    continue;
                };
                host.set_active(path.clone());
                OrchestratorEvent::DocumentChanged { path, text }
            }
            Line::Close(raw) => OrchestratorEvent::DocumentClosed(resolve_path(&cwd, raw)),
            Line::Fix(raw) => {
                if let Some(raw) = raw {
                    host.set_active(resolve_path(&cwd, raw));
                }
                OrchestratorEvent::Command(Command::ExecuteAutofix)
            }
            Line::Restart => OrchestratorEvent::Command(Command::Restart),
            Line::Output => OrchestratorEvent::Command(Command::ShowOutputChannel),
            Line::Commands => OrchestratorEvent::Command(Command::ShowCommands),
            Line::Folders(dirs) => OrchestratorEvent::WorkspaceFoldersChanged(
                dirs.into_iter().map(|dir| resolve_path(&cwd, dir)).collect(),
            ),
            Line::Help => {
                println!("{HELP}");
                continue;
            }
            Line::Quit => break,
            Line::Missing(usage) => {
                println!("usage: {usage}");
                continue;
            }
            Line::Unknown(cmd) => {
                println!("unknown command `{cmd}`, try `help`");
                continue;
            }
            Line::Empty => continue,
        };

        if events.send(event).await.is_err() {
            return;
        }
    }

    let _ = events.send(OrchestratorEvent::Shutdown).await;
}

async fn forward_ctrl_c(events: mpsc::Sender<OrchestratorEvent>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = events.send(OrchestratorEvent::Shutdown).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let process_log_dir = init_tracing();

    let config = load_config(args.config.as_deref());
    let cwd = std::env::current_dir().context("reading current directory")?;
    let folders = args
        .folders
        .iter()
        .map(|folder| resolve_path(&cwd, folder))
        .collect();
    let log_dir = args
        .log_dir
        .or_else(|| process_log_dir.map(|dir| dir.join("channels")));

    let mut orchestrator = Orchestrator::new(OrchestratorOptions {
        config,
        folders,
        log_dir,
    })?;

    let host = Arc::new(TerminalHost::default());
    let events = orchestrator.events();
    tokio::spawn(process_input(
        spawn_stdin_reader(),
        Arc::clone(&host),
        events.clone(),
        cwd,
    ));
    tokio::spawn(forward_ctrl_c(events));

    let report = orchestrator.start(host.as_ref()).await;
    print_report(&report);
    println!("type `help` for commands");

    orchestrator.run(host.as_ref()).await;
    tracing::info!("Exited after {} restart(s)", orchestrator.restart_count());
    Ok(())
}
