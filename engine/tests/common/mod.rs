//! Workspace fixtures and a recording editor host.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use biome_monorepo_engine::{
    Command, EditorHost, EngineConfig, Orchestrator, OrchestratorOptions, OutputChannel,
    PaletteItem, StatusGlyph, StatusItem,
};
use biome_monorepo_types::PlatformTarget;

const FAKE_BIOME: &str = include_str!("fake_biome.sh");

/// One orchestrator per process; tests take this lock first.
pub static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.root()
        } else {
            self.dir.path().join(rel)
        }
    }

    pub fn write(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    /// A package whose manifest declares `@biomejs/biome`.
    pub fn project(&self, rel: &str) -> PathBuf {
        let manifest = if rel.is_empty() {
            "package.json".to_string()
        } else {
            format!("{rel}/package.json")
        };
        self.write(
            &manifest,
            r#"{"name":"fixture","devDependencies":{"@biomejs/biome":"*"}}"#,
        );
        self.path(rel)
    }

    /// Install `@biomejs/biome` plus a working platform binary under `rel/node_modules`.
    /// Returns the directory holding the binary.
    pub fn install_biome(&self, rel: &str, version: &str) -> PathBuf {
        let bin_dir = self.install_package_only(rel, version);
        let binary = bin_dir.join(PlatformTarget::current().unwrap().binary_name());
        fs::write(&binary, FAKE_BIOME.replace("@VERSION@", version)).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
        bin_dir
    }

    /// Install `@biomejs/biome` and the platform package manifest, but no binary.
    pub fn install_package_only(&self, rel: &str, version: &str) -> PathBuf {
        let prefix = if rel.is_empty() {
            String::new()
        } else {
            format!("{rel}/")
        };
        self.write(
            &format!("{prefix}node_modules/@biomejs/biome/package.json"),
            &format!(r#"{{"name":"@biomejs/biome","version":"{version}"}}"#),
        );
        let cli = PlatformTarget::current().unwrap().package_name();
        let manifest = self.write(
            &format!("{prefix}node_modules/{cli}/package.json"),
            &format!(r#"{{"name":"{cli}","version":"{version}"}}"#),
        );
        manifest.parent().unwrap().to_path_buf()
    }
}

pub fn options(workspace: &Workspace, log_dir: Option<PathBuf>) -> OrchestratorOptions {
    let mut config = EngineConfig::default();
    config.lsp.init_timeout_secs = 10;
    config.lsp.shutdown_timeout_secs = 1;
    config.watch.debounce_ms = 100;
    OrchestratorOptions {
        config,
        folders: vec![workspace.root()],
        log_dir,
    }
}

pub fn orchestrator(workspace: &Workspace) -> Orchestrator {
    Orchestrator::new(options(workspace, None)).unwrap()
}

/// Process ids recorded by a fake binary, one per spawn.
pub fn starts(bin_dir: &Path) -> usize {
    fs::read_to_string(bin_dir.join("starts.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

/// The last `initialize` request a fake binary received.
pub fn initialize_request(bin_dir: &Path) -> Value {
    let body = fs::read_to_string(bin_dir.join("initialize.json")).unwrap();
    serde_json::from_str(&body).unwrap()
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

#[derive(Default)]
pub struct RecordingHost {
    pub statuses: Mutex<Vec<Option<StatusGlyph>>>,
    pub shown: Mutex<Vec<String>>,
    pub applied: Mutex<Vec<(String, PathBuf, Value)>>,
    pub active: Mutex<Option<PathBuf>>,
    pub pick: Option<Command>,
}

impl RecordingHost {
    pub fn last_status(&self) -> Option<StatusGlyph> {
        self.statuses.lock().unwrap().last().copied().flatten()
    }
}

impl EditorHost for RecordingHost {
    fn show_output_channel(&self, channel: &OutputChannel) {
        self.shown.lock().unwrap().push(channel.name().to_string());
    }

    fn active_document(&self) -> Option<PathBuf> {
        self.active.lock().unwrap().clone()
    }

    fn execute_source_action(&self, kind: &str, path: &Path, actions: &Value) {
        self.applied
            .lock()
            .unwrap()
            .push((kind.to_string(), path.to_path_buf(), actions.clone()));
    }

    async fn pick_command(&self, _items: &[PaletteItem]) -> Option<Command> {
        self.pick
    }

    fn set_status(&self, status: Option<&StatusItem>) {
        self.statuses
            .lock()
            .unwrap()
            .push(status.map(|item| item.glyph));
    }
}
