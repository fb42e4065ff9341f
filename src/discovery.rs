//! Discovery of user Maildirs below the mail storage root
//!
//! The root holds one directory per user. Discovery lists it once and builds
//! the walker state and driving handle for every user directory, allocating
//! a fresh watch set for each through the supplied factory.

use crate::error::{DiscoveryError, WatchError};
use crate::walker::{UserHandle, UserMaildir};
use crate::watch::WatchSet;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Walker state and handle for one discovered user
#[derive(Debug)]
pub struct DiscoveredUser<W> {
    pub maildir: UserMaildir<W>,
    pub handle: UserHandle,
}

/// Build one walker per user directory below `root`, sorted by name
///
/// Entries that are not directories (stray files, symlinks) are skipped.
/// If the root cannot be listed the cause is returned rather than an empty
/// result. If `new_watch` fails for any user, discovery stops and every
/// watch set allocated so far is dropped with the partial result.
pub fn discover_users<W, F>(
    root: &Path,
    mut new_watch: F,
) -> Result<Vec<DiscoveredUser<W>>, DiscoveryError>
where
    W: WatchSet,
    F: FnMut(&Path) -> Result<W, WatchError>,
{
    let read_err = |source: io::Error| DiscoveryError::ReadRoot {
        path: root.to_path_buf(),
        source,
    };

    let mut entries = std::fs::read_dir(root)
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort_by_key(|e| e.file_name());

    let mut users = Vec::with_capacity(entries.len());

    for entry in entries {
        let file_type = entry.file_type().map_err(read_err)?;
        if !file_type.is_dir() {
            debug!(path = %entry.path().display(), "Skipping non-directory in Maildir root");
            continue;
        }

        let user_path = root.join(entry.file_name());
        let watch = new_watch(&user_path)?;
        let (maildir, handle) = UserMaildir::new(user_path, watch);

        users.push(DiscoveredUser { maildir, handle });
    }

    info!(root = %root.display(), users = users.len(), "Discovered user Maildirs");
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct CountingWatch {
        dropped: Arc<AtomicUsize>,
    }

    impl WatchSet for CountingWatch {
        fn add(&mut self, _path: &Path) -> Result<(), WatchError> {
            Ok(())
        }

        fn watched(&self) -> usize {
            0
        }
    }

    impl Drop for CountingWatch {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(
        dropped: &Arc<AtomicUsize>,
    ) -> impl FnMut(&Path) -> Result<CountingWatch, WatchError> + '_ {
        move |_: &Path| {
            Ok(CountingWatch {
                dropped: Arc::clone(dropped),
            })
        }
    }

    #[test]
    fn test_discover_skips_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("bob")).unwrap();
        fs::create_dir(dir.path().join("alice")).unwrap();
        fs::write(dir.path().join("README"), b"mail root").unwrap();
        let dropped = Arc::new(AtomicUsize::new(0));

        let users = discover_users(dir.path(), counting(&dropped)).unwrap();

        let paths: Vec<PathBuf> = users
            .iter()
            .map(|u| u.maildir.user_path().to_path_buf())
            .collect();
        assert_eq!(paths, vec![dir.path().join("alice"), dir.path().join("bob")]);
        assert_eq!(users[0].handle.user_path(), dir.path().join("alice"));
    }

    #[test]
    fn test_empty_root() {
        let dir = tempdir().unwrap();
        let dropped = Arc::new(AtomicUsize::new(0));

        let users = discover_users(dir.path(), counting(&dropped)).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_missing_root_reports_cause() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("missing");
        let dropped = Arc::new(AtomicUsize::new(0));

        let err = discover_users(&root, counting(&dropped)).unwrap_err();

        match err {
            DiscoveryError::ReadRoot { path, source } => {
                assert_eq!(path, root);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_watch_failure_releases_earlier_users() {
        let dir = tempdir().unwrap();
        for name in ["alice", "bob", "carol"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut allocated = 0;

        let result = discover_users(dir.path(), |user| {
            if user.ends_with("bob") {
                return Err(WatchError::Init {
                    user: user.to_path_buf(),
                    source: notify::Error::generic("too many open files"),
                });
            }
            allocated += 1;
            Ok(CountingWatch {
                dropped: Arc::clone(&dropped),
            })
        });

        assert!(matches!(result, Err(DiscoveryError::Watch(WatchError::Init { .. }))));
        assert_eq!(allocated, 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_user_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("alice")).unwrap();
        std::os::unix::fs::symlink(root.join("alice"), root.join("alias")).unwrap();
        let dropped = Arc::new(AtomicUsize::new(0));

        let users = discover_users(&root, counting(&dropped)).unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].maildir.user_path(), root.join("alice"));
    }
}
