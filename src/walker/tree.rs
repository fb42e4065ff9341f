//! Deterministic traversal of one user's mail tree
//!
//! The walk is depth-first, pre-order, visits siblings sorted by file name
//! and never follows symlinks. The user root is registered for watching but
//! never counted. Below the root only directories and regular files count:
//!
//! ```text
//! alice/            registered, not counted
//! ├── cur/          folder   registered   hashed
//! ├── new/          folder   registered   hashed
//! │   └── 17000.M1  file     size summed  hashed
//! ├── link -> cur   skipped
//! └── tmp/          folder   registered   hashed
//! ```

use crate::checksum::StructuralChecksum;
use crate::error::WalkError;
use crate::watch::WatchSet;
use std::path::Path;
use tracing::trace;
use walkdir::WalkDir;

/// Structural fingerprint of one completed walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkResult {
    /// Folders plus files
    pub elements: u64,
    pub folders: u64,
    pub files: u64,
    /// Sum of regular file sizes in bytes
    pub size: u64,
    /// Hex SHA-512 over the visited paths in traversal order
    pub checksum: String,
}

/// Walk `user_path`, registering every directory with `watch`
///
/// Any unreadable entry or failed registration aborts the walk.
pub fn walk_tree<W: WatchSet + ?Sized>(
    user_path: &Path,
    watch: &mut W,
) -> Result<WalkResult, WalkError> {
    let mut result = WalkResult::default();
    let mut checksum = StructuralChecksum::new();

    for entry in WalkDir::new(user_path).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| WalkError::traverse(user_path, e))?;
        let path = entry.path();

        if entry.depth() == 0 {
            register(watch, path)?;
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            result.folders += 1;
            register(watch, path)?;
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| WalkError::traverse(path, e))?;
            result.files += 1;
            result.size += metadata.len();
        } else {
            trace!(path = %path.display(), "Skipping special file");
            continue;
        }

        result.elements += 1;
        checksum.update(path);
    }

    result.checksum = checksum.finalize_hex();
    Ok(result)
}

fn register<W: WatchSet + ?Sized>(watch: &mut W, path: &Path) -> Result<(), WalkError> {
    let absolute = std::path::absolute(path).map_err(|source| WalkError::AbsolutePath {
        path: path.to_path_buf(),
        source,
    })?;
    watch.add(&absolute)?;
    Ok(())
}
