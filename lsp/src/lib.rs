//! Language-server plumbing for Biome sessions.
//!
//! Each [`Session`] drives one `biome lsp-proxy` child over stdio. Sessions
//! report diagnostics and exits through [`LspEvent`]s on a shared channel;
//! [`DiagnosticsStore`] aggregates them.

pub mod codec;
pub mod output;
pub mod params;
pub mod protocol;
pub mod selector;
pub mod types;

mod client;
mod diagnostics;
mod session;

pub use diagnostics::DiagnosticsStore;
pub use output::OutputChannel;
pub use params::{DefaultParams, InitializeParamsFiller, WorkspaceFolderOverride};
pub use selector::{DocumentFilter, DocumentSelector};
pub use session::{FIX_ALL_ACTION, Session, SessionContext};
pub use types::{
    BiomeDiagnostic, DiagnosticSeverity, DiagnosticsSnapshot, LspEvent, ServerStopReason,
    SessionId,
};
