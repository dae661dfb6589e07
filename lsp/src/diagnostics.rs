//! Per-file diagnostics from every running session.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::{BiomeDiagnostic, DiagnosticsSnapshot, SessionId};

#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: HashMap<PathBuf, (SessionId, Vec<BiomeDiagnostic>)>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the diagnostics of `path`. An empty list clears the file.
    pub fn update(&mut self, session: SessionId, path: PathBuf, items: Vec<BiomeDiagnostic>) {
        if items.is_empty() {
            self.data.remove(&path);
        } else {
            self.data.insert(path, (session, items));
        }
    }

    /// Drop everything a session published, e.g. after its server died.
    pub fn clear_session(&mut self, session: SessionId) {
        self.data.retain(|_, (owner, _)| *owner != session);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut files: Vec<(PathBuf, Vec<BiomeDiagnostic>)> = self
            .data
            .iter()
            .map(|(path, (_, items))| (path.clone(), items.clone()))
            .collect();

        files.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot::new(files)
    }
}
