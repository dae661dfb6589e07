//! Extension commands and the quick-pick palette.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Restart,
    ShowOutputChannel,
    ExecuteAutofix,
    ShowCommands,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub command: Command,
    pub id: &'static str,
    /// Label shown in the palette; `None` keeps the command out of it.
    pub palette_label: Option<&'static str>,
    pub description: &'static str,
}

// Palette order follows this table.
const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        command: Command::ExecuteAutofix,
        id: "biome-monorepo.executeAutofix",
        palette_label: Some("$(wrench) Fix all auto-fixable Problems"),
        description: "Apply every safe Biome fix to the active document",
    },
    CommandSpec {
        command: Command::Restart,
        id: "biome-monorepo.restart",
        palette_label: Some("$(refresh) Restart"),
        description: "Stop every session and rediscover installations",
    },
    CommandSpec {
        command: Command::ShowOutputChannel,
        id: "biome-monorepo.showOutputChannel",
        palette_label: Some("$(output) Show Output Channel"),
        description: "Show the extension log",
    },
    CommandSpec {
        command: Command::ShowCommands,
        id: "biome-monorepo.showCommands",
        palette_label: None,
        description: "Pick a Biome Monorepo command",
    },
];

pub const PALETTE_PLACEHOLDER: &str = "Select a Biome Monorepo command";

#[must_use]
pub fn command_specs() -> &'static [CommandSpec] {
    COMMAND_SPECS
}

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteItem {
    pub label: &'static str,
    pub command: Command,
}

#[must_use]
pub fn palette_items() -> Vec<PaletteItem> {
    COMMAND_SPECS
        .iter()
        .filter_map(|spec| {
            spec.palette_label.map(|label| PaletteItem {
                label,
                command: spec.command,
            })
        })
        .collect()
}

impl Command {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Restart => "biome-monorepo.restart",
            Self::ShowOutputChannel => "biome-monorepo.showOutputChannel",
            Self::ExecuteAutofix => "biome-monorepo.executeAutofix",
            Self::ShowCommands => "biome-monorepo.showCommands",
        }
    }

    /// One-line description from the command table.
    #[must_use]
    pub fn description(self) -> &'static str {
        COMMAND_SPECS
            .iter()
            .find(|spec| spec.command == self)
            .map_or("", |spec| spec.description)
    }

    /// Parse a full command id such as `biome-monorepo.restart`.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        COMMAND_SPECS
            .iter()
            .find(|spec| spec.id == id)
            .map(|spec| spec.command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_table() {
        for spec in command_specs() {
            assert_eq!(spec.command.id(), spec.id);
            assert_eq!(Command::from_id(spec.id), Some(spec.command));
        }
    }

    #[test]
    fn every_command_has_a_description() {
        for spec in command_specs() {
            assert_eq!(spec.command.description(), spec.description);
            assert!(!spec.command.description().is_empty());
        }
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert_eq!(Command::from_id("biome.restart"), None);
        assert_eq!(Command::from_id(""), None);
    }

    #[test]
    fn palette_lists_autofix_restart_output_in_order() {
        let commands: Vec<Command> = palette_items().iter().map(|i| i.command).collect();
        assert_eq!(
            commands,
            vec![
                Command::ExecuteAutofix,
                Command::Restart,
                Command::ShowOutputChannel
            ]
        );
        assert_eq!(palette_items()[0].label, "$(wrench) Fix all auto-fixable Problems");
    }
}
