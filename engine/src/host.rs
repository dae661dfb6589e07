//! The boundary between the orchestrator and whatever editor hosts it.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;

use biome_monorepo_lsp::{DiagnosticsSnapshot, OutputChannel};

use crate::commands::{Command, PaletteItem};
use crate::status::StatusItem;

pub trait EditorHost: Send + Sync {
    /// Bring an output channel to the front.
    fn show_output_channel(&self, channel: &OutputChannel);

    /// The document the user is working on, if any.
    fn active_document(&self) -> Option<PathBuf>;

    /// Apply the first of `actions` (a `textDocument/codeAction` result) of `kind` to `path`.
    fn execute_source_action(&self, kind: &str, path: &Path, actions: &Value);

    /// Let the user pick a palette entry. `None` when dismissed.
    fn pick_command(&self, items: &[PaletteItem]) -> impl Future<Output = Option<Command>> + Send;

    /// Show or update the status item; `None` hides it.
    fn set_status(&self, status: Option<&StatusItem>);

    /// Aggregated diagnostics changed.
    fn publish_diagnostics(&self, _snapshot: &DiagnosticsSnapshot) {}
}
