//! File system watcher with debouncing for watch mode.
//!
//! Watches the project directory and forwards relevant changes, ignoring
//! `node_modules`, hidden files and the output directory (writing output must
//! not trigger another rebuild).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher sending filtered, debounced changes through a channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory to watch recursively
    /// * `ignored_dirs` - Absolute directories whose contents never count as changes
    /// * `debounce` - Repeated events for the same path within this window are dropped
    ///
    /// # Errors
    ///
    /// Returns [`Error::Watch`] if the platform watcher cannot be created or
    /// `root` cannot be watched.
    pub fn new(
        root: PathBuf,
        ignored_dirs: Vec<PathBuf>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let (tx, rx) = mpsc::channel(100);

        let mut last_event: Option<(PathBuf, Instant)> = None;
        let filter_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            for path in &event.paths {
                if should_ignore(path, &filter_root, &ignored_dirs) {
                    continue;
                }

                // Access events must not occupy the debounce window.
                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                // The receiver is gone once the watch task stops.
                let _ = tx.blocking_send(change);
            }
        })
        .map_err(Error::Watch)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(Error::Watch)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn should_ignore(path: &Path, root: &Path, ignored_dirs: &[PathBuf]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };

    if ignored_dirs.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name == "node_modules" || (name.starts_with('.') && name != "." && name != ".."))
    })
}
