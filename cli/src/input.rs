//! Line commands read from stdin.

use std::path::{Path, PathBuf};

pub(crate) const HELP: &str = "\
Commands:
  open <file>        send a document to the session that owns it
  change <file>      resend a document after editing it
  close <file>       close a document
  fix [<file>]       apply all safe fixes to <file> or the active document
  restart            stop every session and rediscover installations
  output             show the extension log
  commands           pick a command from the palette
  folders <dir>...   replace the workspace folders
  quit               stop every session and exit";

/// Parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Open(&'a str),
    Change(&'a str),
    Close(&'a str),
    Fix(Option<&'a str>),
    Restart,
    Output,
    Commands,
    Folders(Vec<&'a str>),
    Help,
    Quit,
    Missing(&'static str),
    Unknown(&'a str),
    Empty,
}

impl<'a> Line<'a> {
    pub(crate) fn parse(raw: &'a str) -> Self {
        let mut parts = raw.split_whitespace();
        let Some(head) = parts.next() else {
            return Line::Empty;
        };
        let arg = parts.next();

        match head {
            "open" | "o" => arg.map_or(Line::Missing("open <file>"), Line::Open),
            "change" => arg.map_or(Line::Missing("change <file>"), Line::Change),
            "close" => arg.map_or(Line::Missing("close <file>"), Line::Close),
            "fix" => Line::Fix(arg),
            "restart" => Line::Restart,
            "output" => Line::Output,
            "commands" => Line::Commands,
            "folders" => {
                let dirs: Vec<&str> = arg.into_iter().chain(parts).collect();
                if dirs.is_empty() {
                    Line::Missing("folders <dir>...")
                } else {
                    Line::Folders(dirs)
                }
            }
            "help" | "?" => Line::Help,
            "quit" | "q" | "exit" => Line::Quit,
            other => Line::Unknown(other),
        }
    }
}

/// Resolve a user-supplied path against `cwd`, canonicalizing when it exists.
pub(crate) fn resolve_path(cwd: &Path, raw: impl AsRef<Path>) -> PathBuf {
    let path = cwd.join(raw);
    dunce::canonicalize(&path).unwrap_or(path)
}
