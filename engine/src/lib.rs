//! Orchestration of per-installation Biome sessions.
//!
//! [`Orchestrator`] discovers every `@biomejs/biome` installation under the
//! workspace folders, runs one language-server session per installation, and
//! restarts the whole set when folders or lock files change. The editor side
//! is abstracted behind [`EditorHost`].

pub mod commands;
pub mod config;
pub mod host;
pub mod orchestrator;
pub mod status;
pub mod watcher;

mod error;

pub use commands::{Command, CommandSpec, PaletteItem, command_specs, palette_items};
pub use config::{EngineConfig, config_dir, config_path};
pub use error::EngineError;
pub use host::EditorHost;
pub use orchestrator::{
    ExtensionState, Orchestrator, OrchestratorEvent, OrchestratorOptions, StartFailure,
    StartReport,
};
pub use status::{StatusGlyph, StatusItem};
pub use watcher::LockFileWatcher;

pub use biome_monorepo_lsp::{DiagnosticsSnapshot, OutputChannel};
