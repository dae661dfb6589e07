//! Lock-file watching.
//!
//! Package managers usually replace lock files instead of writing them in
//! place, which drops a watch placed on the file itself. The watcher therefore
//! watches each lock file's directory and filters events down to the lock
//! files found at start time.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::orchestrator::OrchestratorEvent;

/// Watches a fixed set of lock files. Dropping it disposes every watch.
pub struct LockFileWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl LockFileWatcher {
    pub fn new(
        lock_files: &[PathBuf],
        debounce: Duration,
        events: mpsc::Sender<OrchestratorEvent>,
    ) -> Result<Self, EngineError> {
        let mut targets = HashSet::new();
        for path in lock_files {
            targets.insert(path.clone());
            if let Ok(canonical) = std::fs::canonicalize(path) {
                targets.insert(canonical);
            }
        }

        let mut filter = ChangeFilter::new(targets, debounce);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(path) = filter.accept(&event, Instant::now())
                        && let Err(e) = events.try_send(OrchestratorEvent::LockFileChanged(path))
                    {
                        tracing::debug!("Dropping lock file event: {e}");
                    }
                }
                Err(e) => tracing::warn!("Lock file watcher error: {e}"),
            },
            Config::default(),
        )?;

        let mut dirs: Vec<&Path> = lock_files.iter().filter_map(|p| p.parent()).collect();
        dirs.sort();
        dirs.dedup();
        for dir in dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        Ok(Self {
            _watcher: watcher,
            watched: lock_files.to_vec(),
        })
    }

    #[must_use]
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Turns raw notify events into at most one change per lock file per debounce window.
struct ChangeFilter {
    targets: HashSet<PathBuf>,
    debounce: Duration,
    last_seen: HashMap<PathBuf, Instant>,
}

impl ChangeFilter {
    fn new(targets: HashSet<PathBuf>, debounce: Duration) -> Self {
        Self {
            targets,
            debounce,
            last_seen: HashMap::new(),
        }
    }

    fn accept(&mut self, event: &Event, now: Instant) -> Option<PathBuf> {
        match event.kind {
            EventKind::Create(_) => {}
            EventKind::Modify(ModifyKind::Metadata(_)) => return None,
            EventKind::Modify(_) => {}
            _ => return None,
        }

        let path = event.paths.iter().find(|p| self.targets.contains(*p))?;

        if let Some(last) = self.last_seen.get(path)
            && now.duration_since(*last) < self.debounce
        {
            return None;
        }
        self.last_seen.insert(path.clone(), now);
        Some(path.clone())
    }
}
