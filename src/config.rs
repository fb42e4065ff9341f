//! Configuration types for maildir-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Debounce window limits in milliseconds
const MIN_DEBOUNCE_MS: u64 = 10;
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Maildir structure monitor
#[derive(Parser, Debug, Clone)]
#[command(
    name = "maildir-walker",
    version,
    about = "Watches per-user Maildirs and publishes their structure as gauges",
    long_about = "Discovers one Maildir per user below MAILDIR_ROOT, walks each tree and \
                  publishes element, folder and file counts plus total size labeled with a \
                  SHA-512 checksum of the tree's path structure.\n\n\
                  Every walk registers the directories it visits for change notification; \
                  changes below them trigger a new walk after the debounce window.",
    after_help = "EXAMPLES:\n    \
        maildir-walker /var/vmail\n    \
        maildir-walker /var/vmail -o /var/lib/node_exporter/textfile/maildir.prom\n    \
        maildir-walker /srv/mail --debounce-ms 250 -v"
)]
pub struct CliArgs {
    /// Mail storage root containing one directory per user
    #[arg(value_name = "MAILDIR_ROOT")]
    pub maildir_root: PathBuf,

    /// Quiet period after the last change before a user is re-walked
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS, value_name = "MS")]
    pub debounce_ms: u64,

    /// Prometheus textfile rewritten after every completed walk
    #[arg(short = 'o', long, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,

    /// Quiet mode - suppress header and summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Mail storage root
    pub maildir_root: PathBuf,

    /// Trailing debounce window per user
    pub debounce: Duration,

    /// Optional Prometheus textfile output
    pub metrics_file: Option<PathBuf>,

    /// Print header and summary
    pub show_progress: bool,

    /// Debug logging
    pub verbose: bool,
}

impl MonitorConfig {
    /// Configuration with defaults for `maildir_root`
    pub fn new(maildir_root: impl Into<PathBuf>) -> Self {
        Self {
            maildir_root: maildir_root.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            metrics_file: None,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Validate root
        match std::fs::metadata(&args.maildir_root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ConfigError::InvalidRoot {
                    path: args.maildir_root,
                    reason: "not a directory".to_string(),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidRoot {
                    path: args.maildir_root,
                    reason: e.to_string(),
                })
            }
        }

        // Validate debounce window
        if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&args.debounce_ms) {
            return Err(ConfigError::InvalidDebounce {
                millis: args.debounce_ms,
                min: MIN_DEBOUNCE_MS,
                max: MAX_DEBOUNCE_MS,
            });
        }

        // Validate output path
        if let Some(ref file) = args.metrics_file {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() && !parent.is_dir() {
                    return Err(ConfigError::InvalidOutputPath {
                        path: file.clone(),
                        reason: format!("Parent directory '{}' does not exist", parent.display()),
                    });
                }
            }
            if file.is_dir() {
                return Err(ConfigError::InvalidOutputPath {
                    path: file.clone(),
                    reason: "is a directory".to_string(),
                });
            }
        }

        Ok(Self {
            maildir_root: args.maildir_root,
            debounce: Duration::from_millis(args.debounce_ms),
            metrics_file: args.metrics_file,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("maildir-walker").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let config = MonitorConfig::from_args(parse(&[root])).unwrap();

        assert_eq!(config.maildir_root, dir.path());
        assert_eq!(config.debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert!(config.metrics_file.is_none());
        assert!(config.show_progress);
        assert!(!config.verbose);
    }

    #[test]
    fn test_flags() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let out = dir.path().join("maildir.prom");

        let config = MonitorConfig::from_args(parse(&[
            root,
            "--debounce-ms",
            "250",
            "-o",
            out.to_str().unwrap(),
            "-q",
            "-v",
        ]))
        .unwrap();

        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.metrics_file, Some(out));
        assert!(!config.show_progress);
        assert!(config.verbose);
    }

    #[test]
    fn test_missing_root_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nope");

        let err = MonitorConfig::from_args(parse(&[root.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoot { .. }));
    }

    #[test]
    fn test_file_root_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("README");
        std::fs::write(&file, b"x").unwrap();

        let err = MonitorConfig::from_args(parse(&[file.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoot { ref reason, .. } if reason == "not a directory"));
    }

    #[test]
    fn test_debounce_range() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let err = MonitorConfig::from_args(parse(&[root, "--debounce-ms", "5"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDebounce { millis: 5, .. }));

        let err = MonitorConfig::from_args(parse(&[root, "--debounce-ms", "60001"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDebounce { .. }));
    }

    #[test]
    fn test_metrics_file_parent_must_exist() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let out = dir.path().join("missing").join("maildir.prom");

        let err = MonitorConfig::from_args(parse(&[root, "-o", out.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOutputPath { .. }));
    }
}
