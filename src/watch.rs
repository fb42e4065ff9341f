//! Per-user watch sets
//!
//! A [`WatchSet`] is the capability a walker uses to register directories for
//! change notification. The walker only ever adds paths; the set grows as
//! walks discover new directories and is never pruned.
//!
//! [`NotifyWatch`] backs a watch set with a `notify` recommended watcher.
//! Directories are registered non-recursively, so a directory created after
//! the last walk stays unwatched until a later walk visits it.

use crate::error::WatchError;
use crossbeam_channel::Sender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Capability to register paths for change notification
pub trait WatchSet: Send {
    /// Register `path`. Registering an already watched path again keeps a
    /// single entry in the set.
    fn add(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Number of paths currently registered
    fn watched(&self) -> usize;
}

/// A filesystem change observed under one user's watch set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// User root path the event belongs to
    pub user: PathBuf,
    /// Paths reported by the backend
    pub paths: Vec<PathBuf>,
}

/// Watch set backed by a `notify` watcher
pub struct NotifyWatch {
    user: PathBuf,
    watcher: RecommendedWatcher,
    paths: HashSet<PathBuf>,
}

impl NotifyWatch {
    /// Allocate a watcher for `user` forwarding its events to `events`
    pub fn new(user: &Path, events: Sender<WatchEvent>) -> Result<Self, WatchError> {
        let tag = user.to_path_buf();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_change(&event.kind) {
                    return;
                }
                trace!(user = %tag.display(), kind = ?event.kind, "Watch event");
                // A closed receiver means the driver is gone
                let _ = events.send(WatchEvent {
                    user: tag.clone(),
                    paths: event.paths,
                });
            }
            Err(e) => warn!(user = %tag.display(), error = %e, "Watch backend error"),
        })
        .map_err(|source| WatchError::Init {
            user: user.to_path_buf(),
            source,
        })?;

        Ok(Self {
            user: user.to_path_buf(),
            watcher,
            paths: HashSet::new(),
        })
    }

    /// User root path this watch set belongs to
    pub fn user(&self) -> &Path {
        &self.user
    }
}

impl WatchSet for NotifyWatch {
    fn add(&mut self, path: &Path) -> Result<(), WatchError> {
        // Re-adding renews the watch of a folder that was deleted and recreated
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: path.to_path_buf(),
                source,
            })?;

        self.paths.insert(path.to_path_buf());
        Ok(())
    }

    fn watched(&self) -> usize {
        self.paths.len()
    }
}

impl std::fmt::Debug for NotifyWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatch")
            .field("user", &self.user)
            .field("watched", &self.paths.len())
            .finish()
    }
}

/// Access events come from readers, including the walk itself opening
/// directories, and must never feed back into a trigger.
fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use tempfile::tempdir;

    #[test]
    fn test_access_events_ignored() {
        assert!(!is_change(&EventKind::Access(AccessKind::Any)));
        assert!(is_change(&EventKind::Create(CreateKind::File)));
        assert!(is_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_change(&EventKind::Remove(notify::event::RemoveKind::Folder)));
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut watch = NotifyWatch::new(dir.path(), tx).unwrap();

        watch.add(dir.path()).unwrap();
        watch.add(dir.path()).unwrap();
        assert_eq!(watch.watched(), 1);
        assert_eq!(watch.user(), dir.path());
    }

    #[test]
    fn test_add_missing_path_fails() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut watch = NotifyWatch::new(dir.path(), tx).unwrap();

        let missing = dir.path().join("gone");
        let err = watch.add(&missing).unwrap_err();
        assert!(matches!(err, WatchError::Register { ref path, .. } if path == &missing));
        assert_eq!(watch.watched(), 0);
    }
}
