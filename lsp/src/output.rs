//! Named output channels.
//!
//! Every line goes to `tracing` tagged with the channel name and, when a log
//! directory is configured, is appended to `<log dir>/<slug>.log` so each
//! channel can be opened on its own.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;

#[derive(Debug)]
pub struct OutputChannel {
    name: String,
    log_path: Option<PathBuf>,
    file: Option<Mutex<File>>,
}

impl OutputChannel {
    /// Create a channel. Failing to open the log file degrades to tracing-only.
    pub fn new(name: impl Into<String>, log_dir: Option<&Path>) -> Self {
        let name = name.into();
        let mut log_path = None;
        let mut file = None;

        if let Some(dir) = log_dir {
            let path = dir.join(format!("{}.log", slug(&name)));
            let opened = fs::create_dir_all(dir).and_then(|()| {
                OpenOptions::new().create(true).append(true).open(&path)
            });
            match opened {
                Ok(handle) => {
                    file = Some(Mutex::new(handle));
                    log_path = Some(path);
                }
                Err(e) => {
                    tracing::warn!(channel = %name, "Cannot open {}: {e}", path.display());
                }
            }
        }

        Self {
            name,
            log_path,
            file,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File backing this channel, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log(&self, level: Level, message: &str) {
        let channel = self.name.as_str();
        match level {
            Level::ERROR => tracing::error!(channel, "{message}"),
            Level::WARN => tracing::warn!(channel, "{message}"),
            Level::INFO => tracing::info!(channel, "{message}"),
            Level::DEBUG => tracing::debug!(channel, "{message}"),
            _ => tracing::trace!(channel, "{message}"),
        }

        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            // A full disk shouldn't take the session down with it.
            let _ = writeln!(file, "[{}] {message}", level.as_str().to_ascii_lowercase());
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::TRACE, message);
    }
}

/// File-name-safe form of a channel name: `Biome (1.9.4) - LSP` → `biome-1-9-4-lsp`.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
