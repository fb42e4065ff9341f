//! maildir-walker - Maildir structure monitor
//!
//! Watches a mail storage root holding one Maildir per user and keeps a set
//! of gauges describing every user's tree: element, folder and file counts
//! and the total size of regular files, labeled with a SHA-512 checksum of
//! the tree's path structure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      MAILDIR_ROOT                             │
//! │          alice/   bob/   carol/   (stray files ignored)       │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ discover_users
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Walker threads (one per user)                 │
//! │  ┌──────────────┐  ┌──────────────┐        ┌──────────────┐   │
//! │  │ walker-alice │  │ walker-bob   │  ...   │ walker-carol │   │
//! │  │ NotifyWatch  │  │ NotifyWatch  │        │ NotifyWatch  │   │
//! │  └──────┬───────┘  └──────┬───────┘        └──────┬───────┘   │
//! │         │ WalkReport      │                       │           │
//! │         └─────────────────┼───────────────────────┘           │
//! │                           ▼                                   │
//! │            ┌──────────────────────────────┐                   │
//! │            │  Monitor loop                │                   │
//! │            │  - per-user debounce         │◄── WatchEvent     │
//! │            │  - walker supervision        │                   │
//! │            └──────────────┬───────────────┘                   │
//! └───────────────────────────┼───────────────────────────────────┘
//!                             ▼
//!                  ┌────────────────────┐
//!                  │  GaugeRegistry     │
//!                  │  (textfile/stdout) │
//!                  └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Print gauges to stdout on Ctrl-C
//! maildir-walker /var/vmail
//!
//! # Keep a node_exporter textfile current
//! maildir-walker /var/vmail -o /var/lib/node_exporter/textfile/maildir.prom
//! ```

pub mod checksum;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod progress;
pub mod walker;
pub mod watch;

pub use config::{CliArgs, MonitorConfig};
pub use discovery::{discover_users, DiscoveredUser};
pub use error::{MonitorError, Result};
pub use metrics::{GaugeRegistry, MetricsSink};
pub use monitor::{Monitor, MonitorSummary};
pub use walker::{walk_tree, UserHandle, UserMaildir, WalkResult};
pub use watch::{NotifyWatch, WatchSet};
