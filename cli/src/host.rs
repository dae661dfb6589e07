//! Terminal implementation of the editor host.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use biome_monorepo_engine::commands::PALETTE_PLACEHOLDER;
use biome_monorepo_engine::{
    Command, DiagnosticsSnapshot, EditorHost, OutputChannel, PaletteItem, StatusItem,
};

const OUTPUT_TAIL_LINES: usize = 40;

#[derive(Default)]
pub(crate) struct TerminalHost {
    active: Mutex<Option<PathBuf>>,
    /// Set while a palette is waiting for the next input line.
    pending_pick: Mutex<Option<oneshot::Sender<String>>>,
}

impl TerminalHost {
    pub(crate) fn set_active(&self, path: PathBuf) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(path);
    }

    /// Give `line` to a waiting palette. Returns it when nobody is waiting.
    pub(crate) fn answer_pick(&self, line: String) -> Option<String> {
        let pending = self
            .pending_pick
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(tx) => {
                let _ = tx.send(line);
                None
            }
            None => Some(line),
        }
    }
}

fn palette_line(index: usize, item: &PaletteItem) -> String {
    format!(
        "  {}. {}  {}",
        index + 1,
        item.label,
        item.command.description()
    )
}

/// A palette answer: 1-based index or full command id.
fn parse_pick(answer: &str, items: &[PaletteItem]) -> Option<Command> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| items.get(i))
            .map(|item| item.command);
    }
    Command::from_id(answer).filter(|command| items.iter().any(|item| item.command == *command))
}

impl EditorHost for TerminalHost {
    fn show_output_channel(&self, channel: &OutputChannel) {
        println!("==> {} <==", channel.name());
        let Some(path) = channel.log_path() else {
            println!("(channel has no log file)");
            return;
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let lines: Vec<&str> = content.lines().collect();
                let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
                for line in &lines[start..] {
                    println!("{line}");
                }
                println!("(full log: {})", path.display());
            }
            Err(e) => println!("cannot read {}: {e}", path.display()),
        }
    }

    fn active_document(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn execute_source_action(&self, kind: &str, path: &Path, actions: &Value) {
        let actions = actions.as_array().map(Vec::as_slice).unwrap_or_default();
        let Some(first) = actions.first() else {
            println!("{kind}: nothing to fix in {}", path.display());
            return;
        };
        let title = first
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        println!("{kind} for {}: {title}", path.display());
    }

    fn pick_command(&self, items: &[PaletteItem]) -> impl Future<Output = Option<Command>> + Send {
        println!("{PALETTE_PLACEHOLDER}:");
        for (i, item) in items.iter().enumerate() {
            println!("{}", palette_line(i, item));
        }

        let (tx, rx) = oneshot::channel();
        *self
            .pending_pick
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let items = items.to_vec();
        async move {
            let answer = rx.await.ok()?;
            parse_pick(&answer, &items)
        }
    }

    fn set_status(&self, status: Option<&StatusItem>) {
        match status {
            Some(item) => match item.tooltip() {
                Some(tooltip) => println!("[status] {} {tooltip}", item.text()),
                None => println!("[status] {}", item.text()),
            },
            None => println!("[status] hidden"),
        }
    }

    fn publish_diagnostics(&self, snapshot: &DiagnosticsSnapshot) {
        if snapshot.is_empty() {
            println!("[diagnostics] clean");
            return;
        }
        println!("[diagnostics] {}", snapshot.status_string());
        for (path, items) in snapshot.files() {
            for item in items {
                println!("  {}", item.display_with_path(path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biome_monorepo_engine::palette_items;

    #[test]
    fn picks_by_index_or_id() {
        let items = palette_items();
        assert_eq!(parse_pick("1", &items), Some(Command::ExecuteAutofix));
        assert_eq!(parse_pick(" 2 ", &items), Some(Command::Restart));
        assert_eq!(
            parse_pick("biome-monorepo.showOutputChannel", &items),
            Some(Command::ShowOutputChannel)
        );
    }

    #[test]
    fn palette_lines_are_numbered_and_described() {
        let items = palette_items();
        assert_eq!(
            palette_line(1, &items[1]),
            "  2. $(refresh) Restart  Stop every session and rediscover installations"
        );
    }

    #[test]
    fn out_of_range_or_unlisted_picks_are_dismissals() {
        let items = palette_items();
        assert_eq!(parse_pick("0", &items), None);
        assert_eq!(parse_pick("9", &items), None);
        assert_eq!(parse_pick("biome-monorepo.showCommands", &items), None);
        assert_eq!(parse_pick("", &items), None);
    }

    #[tokio::test]
    async fn palette_waits_for_next_line() {
        let host = TerminalHost::default();
        let items = palette_items();
        let pick = host.pick_command(&items);

        assert_eq!(host.answer_pick("2".to_string()), None);
        assert_eq!(pick.await, Some(Command::Restart));
        assert_eq!(host.answer_pick("restart".to_string()), Some("restart".to_string()));
    }

    #[test]
    fn active_document_tracks_last_set() {
        let host = TerminalHost::default();
        assert_eq!(host.active_document(), None);
        host.set_active(PathBuf::from("/repo/a.ts"));
        host.set_active(PathBuf::from("/repo/b.ts"));
        assert_eq!(host.active_document(), Some(PathBuf::from("/repo/b.ts")));
    }
}
