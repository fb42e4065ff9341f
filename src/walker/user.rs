//! Per-user walk state machine
//!
//! Each user gets one [`UserMaildir`] running on its own thread and one
//! [`UserHandle`] held by whoever drives it:
//!
//! ```text
//!              trigger ──┐                ┌── WalkReport (done channel)
//!  UserHandle            ▼                │
//!             shutdown ─► Idle ──trigger──► Walking ──ok──► Idle
//!                          │                  │
//!                          ▼ shutdown         ▼ error
//!                       Terminated ◄──────────┘
//! ```
//!
//! The walker blocks in a single select over its trigger and shutdown
//! channels. A walk in progress always runs to completion or to its first
//! error before either channel is looked at again.
//!
//! Trigger channels hold one pending trigger. [`UserHandle::trigger`] never
//! blocks: a trigger sent while one is already pending is coalesced into it,
//! and a trigger sent during a walk stays pending and starts the next walk.

use crate::error::{WalkError, WorkerError};
use crate::metrics::{
    MetricsSink, LABEL_SHA512, LABEL_USER, MAILDIR_ELEMENTS, MAILDIR_FILES, MAILDIR_FOLDERS,
    MAILDIR_LAST_WALK, MAILDIR_SIZE_BYTES, MAILDIR_WALKER_UP,
};
use crate::walker::tree::{walk_tree, WalkResult};
use crate::watch::WatchSet;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use humansize::{format_size, BINARY};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error};

/// Completion signal for one successful walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    pub user: PathBuf,
    pub result: WalkResult,
}

/// Why a walker stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerExit {
    /// Shutdown was requested
    Shutdown,
    /// Every handle was dropped, so no trigger can arrive anymore
    Detached,
}

/// Result of offering a trigger to a walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The walker will start a walk
    Queued,
    /// A trigger was already pending and covers this one
    Coalesced,
    /// The walker has exited
    Closed,
}

/// Join handle of a spawned walker thread
pub type WalkerHandle = JoinHandle<Result<WalkerExit, WalkError>>;

/// Walker-side state for one user, owned by the walker thread
#[derive(Debug)]
pub struct UserMaildir<W> {
    user_path: PathBuf,
    watch: W,
    trigger_rx: Receiver<()>,
    shutdown_rx: Receiver<()>,
}

/// Driver-side handle to one user's walker
#[derive(Debug, Clone)]
pub struct UserHandle {
    user_path: PathBuf,
    trigger_tx: Sender<()>,
    shutdown_tx: Sender<()>,
}

impl UserHandle {
    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    /// Ask for a walk without blocking
    pub fn trigger(&self) -> TriggerOutcome {
        match self.trigger_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(TrySendError::Full(())) => TriggerOutcome::Coalesced,
            Err(TrySendError::Disconnected(())) => TriggerOutcome::Closed,
        }
    }

    /// Ask the walker to stop. Returns false if it already exited.
    pub fn shutdown(&self) -> bool {
        match self.shutdown_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

impl<W: WatchSet> UserMaildir<W> {
    /// Build the walker state for `user_path` and its driving handle
    pub fn new(user_path: PathBuf, watch: W) -> (Self, UserHandle) {
        let (trigger_tx, trigger_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = UserHandle {
            user_path: user_path.clone(),
            trigger_tx,
            shutdown_tx,
        };

        let maildir = Self {
            user_path,
            watch,
            trigger_rx,
            shutdown_rx,
        };

        (maildir, handle)
    }

    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    /// Serve triggers until shutdown or the first walk error
    ///
    /// Every successful walk publishes its gauges and sends exactly one
    /// [`WalkReport`] on `done`. A failed walk is logged, marks the walker
    /// down in `metrics` and ends the loop with the error. The trigger
    /// receiver is dropped on return, closing the channel for producers.
    pub fn run<M: MetricsSink + ?Sized>(
        self,
        metrics: &M,
        done: &Sender<WalkReport>,
    ) -> Result<WalkerExit, WalkError> {
        let UserMaildir {
            user_path,
            mut watch,
            trigger_rx,
            shutdown_rx,
        } = self;
        let user = user_path.display().to_string();

        metrics.set_gauge(MAILDIR_WALKER_UP, &[(LABEL_USER, &user)], 1.0);

        loop {
            select! {
                recv(trigger_rx) -> msg => {
                    if msg.is_err() {
                        if shutdown_rx.try_recv().is_ok() {
                            debug!(user = %user, "Done walking Maildir");
                            return Ok(WalkerExit::Shutdown);
                        }
                        debug!(user = %user, "All trigger producers gone, stopping walker");
                        return Ok(WalkerExit::Detached);
                    }

                    match walk_once(&user_path, &user, &mut watch, metrics) {
                        Ok(result) => {
                            let report = WalkReport {
                                user: user_path.clone(),
                                result,
                            };
                            if done.send(report).is_err() {
                                debug!(user = %user, "Completion receiver gone");
                            }
                        }
                        Err(e) => {
                            error!(user = %user, path = %e.path().display(), error = %e, "Error while walking user Maildir");
                            metrics.set_gauge(MAILDIR_WALKER_UP, &[(LABEL_USER, &user)], 0.0);
                            return Err(e);
                        }
                    }
                }
                recv(shutdown_rx) -> msg => {
                    return match msg {
                        Ok(()) => {
                            debug!(user = %user, "Done walking Maildir");
                            Ok(WalkerExit::Shutdown)
                        }
                        Err(_) => Ok(WalkerExit::Detached),
                    };
                }
            }
        }
    }
}

impl<W: WatchSet + 'static> UserMaildir<W> {
    /// Run the walker on a dedicated named thread
    pub fn spawn(
        self,
        metrics: Arc<dyn MetricsSink>,
        done: Sender<WalkReport>,
    ) -> Result<WalkerHandle, WorkerError> {
        let user = self.user_path.display().to_string();
        let name = match self.user_path.file_name() {
            Some(n) => format!("walker-{}", n.to_string_lossy()),
            None => "walker".to_string(),
        };

        thread::Builder::new()
            .name(name)
            .spawn(move || self.run(metrics.as_ref(), &done))
            .map_err(|e| WorkerError::SpawnFailed {
                user,
                reason: e.to_string(),
            })
    }
}

fn walk_once<W: WatchSet, M: MetricsSink + ?Sized>(
    user_path: &Path,
    user: &str,
    watch: &mut W,
    metrics: &M,
) -> Result<WalkResult, WalkError> {
    let start = Instant::now();
    let result = walk_tree(user_path, watch)?;

    publish_walk(metrics, user, &result);

    debug!(
        user = %user,
        elements = result.elements,
        folders = result.folders,
        files = result.files,
        size = %format_size(result.size, BINARY),
        watched = watch.watched(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Walk complete"
    );

    Ok(result)
}

/// Publish the gauges of one completed walk for `user`
///
/// Older size series of the same user are removed once the new one is set,
/// so only the series labeled with the latest checksum remains.
pub fn publish_walk<M: MetricsSink + ?Sized>(metrics: &M, user: &str, result: &WalkResult) {
    let labels = [(LABEL_USER, user)];

    metrics.set_gauge(MAILDIR_ELEMENTS, &labels, result.elements as f64);
    metrics.set_gauge(MAILDIR_FOLDERS, &labels, result.folders as f64);
    metrics.set_gauge(MAILDIR_FILES, &labels, result.files as f64);

    metrics.replace_gauge(
        MAILDIR_SIZE_BYTES,
        &labels,
        &[(LABEL_USER, user), (LABEL_SHA512, &result.checksum)],
        result.size as f64,
    );

    metrics.set_gauge(
        MAILDIR_LAST_WALK,
        &labels,
        chrono::Utc::now().timestamp() as f64,
    );
}
