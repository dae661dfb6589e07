//! Core domain types for biome-monorepo.
//!
//! Pure types with no IO and no async. Discovery produces them, the LSP layer
//! and the orchestrator consume them.

mod install;
mod language;
mod platform;

pub use install::{BinaryLocation, Installation, InstallationPath, ProjectDirectory, ToolVersion};
pub use language::{SUPPORTED_LANGUAGES, is_supported_language, language_for_path};
pub use platform::{PlatformTarget, UnsupportedPlatform};

/// npm package name of the Biome toolchain.
pub const BIOME_PACKAGE: &str = "@biomejs/biome";

/// Display name used for per-version output channels.
pub const DISPLAY_NAME: &str = "Biome";

/// Name of the extension-wide output channel and status item.
pub const EXTENSION_NAME: &str = "Biome Monorepo";

/// Argument that puts the Biome binary into language-server proxy mode.
pub const LSP_PROXY_ARG: &str = "lsp-proxy";

/// Lock files whose changes invalidate discovered installations.
pub const LOCK_FILE_NAMES: [&str; 3] = ["package-lock.json", "yarn.lock", "pnpm-lock.yaml"];
