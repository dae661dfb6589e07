//! Status bar item.

use biome_monorepo_types::EXTENSION_NAME;

use crate::commands::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGlyph {
    /// Shown, no session running.
    Idle,
    Loading,
    Ready,
}

impl StatusGlyph {
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Idle | Self::Ready => "$(biome-logo)",
            Self::Loading => "$(loading~spin)",
        }
    }

    #[must_use]
    pub const fn tooltip(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Loading => Some("Loading Biome Monorepo"),
            Self::Ready => Some(EXTENSION_NAME),
        }
    }
}

/// What the host should display. Clicking it runs `command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub name: &'static str,
    pub glyph: StatusGlyph,
    pub command: Command,
}

impl StatusItem {
    #[must_use]
    pub const fn new(glyph: StatusGlyph) -> Self {
        Self {
            name: EXTENSION_NAME,
            glyph,
            command: Command::ShowCommands,
        }
    }

    #[must_use]
    pub const fn text(&self) -> &'static str {
        self.glyph.text()
    }

    #[must_use]
    pub const fn tooltip(&self) -> Option<&'static str> {
        self.glyph.tooltip()
    }
}
