//! Error types for maildir-walker
//!
//! This module defines the error hierarchy for:
//! - Watch set allocation and registration
//! - Mail storage root discovery
//! - Per-user tree walks
//! - Configuration and CLI errors
//! - Walker thread supervision
//!
//! Discovery errors are fatal to the discovery step. Walk errors are fatal to
//! the affected user's walker only and surface through its join handle.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the maildir-walker application
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Discovery of the mail storage root failed
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Walker thread errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (metrics textfile, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Watch set errors
#[derive(Error, Debug)]
pub enum WatchError {
    /// Failed to allocate a filesystem watcher for a user
    #[error("Failed to create watcher for '{}': {source}", user.display())]
    Init {
        user: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Failed to register a path with the watcher
    #[error("Failed to watch '{}': {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Mail storage root discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The root (or one of its entries) could not be listed
    #[error("Failed to read Maildir root '{}': {source}", path.display())]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Watch handle allocation failed for a user
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Errors that end a user's walker
#[derive(Error, Debug)]
pub enum WalkError {
    /// An entry could not be read during traversal
    #[error("Failed to traverse '{}': {source}", path.display())]
    Traverse {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A directory path could not be made absolute
    #[error("Failed to resolve absolute path of '{}': {source}", path.display())]
    AbsolutePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registering a directory with the watch set failed
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl WalkError {
    /// Build a traversal error, falling back to `root` when walkdir has no path
    pub fn traverse(root: &std::path::Path, source: walkdir::Error) -> Self {
        let path = source
            .path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.to_path_buf());
        WalkError::Traverse { path, source }
    }

    /// Path the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            WalkError::Traverse { path, .. } => path,
            WalkError::AbsolutePath { path, .. } => path,
            WalkError::Watch(WatchError::Init { user, .. }) => user,
            WalkError::Watch(WatchError::Register { path, .. }) => path,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Maildir root missing or not a directory
    #[error("Invalid Maildir root '{}': {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Debounce window out of range
    #[error("Invalid debounce window {millis}ms: must be between {min} and {max}")]
    InvalidDebounce { millis: u64, min: u64, max: u64 },

    /// Output path error
    #[error("Invalid output path '{}': {reason}", path.display())]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Walker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The OS refused to spawn a walker thread
    #[error("Failed to spawn walker for '{user}': {reason}")]
    SpawnFailed { user: String, reason: String },

    /// Walker panicked
    #[error("Walker for '{user}' panicked: {message}")]
    Panicked { user: String, message: String },
}

/// Result type alias for MonitorError
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let watch_err = WatchError::Register {
            path: "/srv/mail/alice/cur".into(),
            source: notify::Error::generic("no space left on device"),
        };
        let walk_err: WalkError = watch_err.into();
        assert!(matches!(walk_err, WalkError::Watch(_)));
        assert_eq!(walk_err.path(), std::path::Path::new("/srv/mail/alice/cur"));

        let discovery_err: DiscoveryError = WatchError::Init {
            user: "/srv/mail/bob".into(),
            source: notify::Error::generic("too many open files"),
        }
        .into();
        let monitor_err: MonitorError = discovery_err.into();
        assert!(matches!(
            monitor_err,
            MonitorError::Discovery(DiscoveryError::Watch(_))
        ));
    }

    #[test]
    fn test_discovery_error_keeps_cause() {
        let err = DiscoveryError::ReadRoot {
            path: "/srv/mail".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/srv/mail"));
        assert!(msg.contains("denied"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::InvalidDebounce {
            millis: 5,
            min: 10,
            max: 60_000,
        };
        assert_eq!(
            err.to_string(),
            "Invalid debounce window 5ms: must be between 10 and 60000"
        );
    }
}
