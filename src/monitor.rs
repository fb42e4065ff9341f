//! Monitor driver - wires discovery, walkers and change notification
//!
//! ```text
//!  discover_users ──► UserMaildir × N ──spawn──► walker threads
//!                                                  │      │
//!  NotifyWatch callbacks ── WatchEvent ──► Debouncer      │ WalkReport
//!                                            │ due        ▼
//!                                   UserHandle::trigger   Monitor loop
//!                                                         └─► metrics textfile
//! ```
//!
//! The monitor loop also supervises walker threads: a walker that ended on a
//! walk error or a panic is joined, logged and counted, and its user is no
//! longer triggered.

use crate::config::MonitorConfig;
use crate::discovery::{discover_users, DiscoveredUser};
use crate::error::{Result, WalkError, WorkerError};
use crate::metrics::{GaugeRegistry, MetricsSink, LABEL_USER, MAILDIR_WALKER_UP};
use crate::walker::{TriggerOutcome, UserHandle, WalkReport, WalkerExit, WalkerHandle};
use crate::watch::{NotifyWatch, WatchEvent};
use crossbeam_channel::{never, select, unbounded};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// How often the loop wakes up without input to fire due triggers
const TICK: Duration = Duration::from_millis(100);

/// Per-user trailing debounce
///
/// Every change pushes the user's deadline to `now + window`; the user is
/// due once no change arrived for a full window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadlines: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Record a change for `user` observed at `now`
    pub fn note(&mut self, user: PathBuf, now: Instant) {
        self.deadlines.insert(user, now + self.window);
    }

    /// Remove and return every user whose deadline passed, sorted
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &due {
            self.deadlines.remove(user);
        }
        due.sort();
        due
    }

    /// Number of users waiting for their window to pass
    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }
}

/// Outcome of a monitor run
#[derive(Debug, Clone, Default)]
pub struct MonitorSummary {
    /// Users discovered below the root
    pub users: usize,
    /// Walks completed across all users
    pub walks: u64,
    /// Walkers that ended on an error or panic
    pub failed: usize,
    pub duration: Duration,
}

struct Supervised {
    handle: UserHandle,
    thread: WalkerHandle,
}

/// Long-running driver for every user below the Maildir root
pub struct Monitor {
    config: MonitorConfig,
    registry: Arc<GaugeRegistry>,
    shutdown: Arc<AtomicBool>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            registry: Arc::new(GaugeRegistry::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get shutdown flag for signal handlers
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Gauges published by the walkers
    pub fn registry(&self) -> Arc<GaugeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Discover users, walk each once, then re-walk on changes until shutdown
    ///
    /// Returns early when every walker has ended.
    pub fn run(&self) -> Result<MonitorSummary> {
        let start = Instant::now();
        let root = &self.config.maildir_root;

        info!(root = %root.display(), debounce_ms = self.config.debounce.as_millis() as u64, "Starting Maildir monitor");

        let (event_tx, mut event_rx) = unbounded::<WatchEvent>();
        let discovered = discover_users(root, |user| NotifyWatch::new(user, event_tx.clone()))?;
        drop(event_tx);

        let users = discovered.len();
        let (done_tx, mut done_rx) = unbounded::<WalkReport>();
        let mut walkers: HashMap<PathBuf, Supervised> = HashMap::with_capacity(users);

        for DiscoveredUser { maildir, handle } in discovered {
            let sink: Arc<dyn MetricsSink> = self.registry.clone();
            let thread = maildir.spawn(sink, done_tx.clone())?;
            handle.trigger();
            walkers.insert(handle.user_path().to_path_buf(), Supervised { handle, thread });
        }
        drop(done_tx);

        let mut debouncer = Debouncer::new(self.config.debounce);
        let mut summary = MonitorSummary {
            users,
            ..Default::default()
        };

        while !self.shutdown.load(Ordering::Relaxed) && !walkers.is_empty() {
            select! {
                recv(event_rx) -> msg => match msg {
                    Ok(event) => {
                        trace!(user = %event.user.display(), paths = event.paths.len(), "Change observed");
                        debouncer.note(event.user, Instant::now());
                    }
                    Err(_) => event_rx = never(),
                },
                recv(done_rx) -> msg => match msg {
                    Ok(report) => {
                        summary.walks += 1;
                        self.on_walk_complete(&report);
                    }
                    Err(_) => done_rx = never(),
                },
                default(TICK) => {}
            }

            for user in debouncer.due(Instant::now()) {
                let Some(walker) = walkers.get(&user) else {
                    continue;
                };
                match walker.handle.trigger() {
                    TriggerOutcome::Queued => debug!(user = %user.display(), "Triggered walk"),
                    TriggerOutcome::Coalesced => trace!(user = %user.display(), "Walk already pending"),
                    TriggerOutcome::Closed => {}
                }
            }

            summary.failed += self.reap(&mut walkers);
        }

        info!(walkers = walkers.len(), "Stopping walkers");
        for walker in walkers.values() {
            walker.handle.shutdown();
        }
        for (user, walker) in walkers.drain() {
            if self.report_exit(&user, walker.thread.join()) {
                summary.failed += 1;
            }
        }

        while let Ok(report) = done_rx.try_recv() {
            summary.walks += 1;
            self.on_walk_complete(&report);
        }

        if let Some(ref path) = self.config.metrics_file {
            self.registry.write_textfile(path)?;
        }

        summary.duration = start.elapsed();
        info!(
            users = summary.users,
            walks = summary.walks,
            failed = summary.failed,
            "Maildir monitor stopped"
        );
        Ok(summary)
    }

    fn on_walk_complete(&self, report: &WalkReport) {
        debug!(
            user = %report.user.display(),
            elements = report.result.elements,
            checksum = %report.result.checksum.get(..16).unwrap_or_default(),
            "Walk reported"
        );

        if let Some(ref path) = self.config.metrics_file {
            if let Err(e) = self.registry.write_textfile(path) {
                warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
            }
        }
    }

    /// Join walkers whose threads ended; returns how many of them failed
    fn reap(&self, walkers: &mut HashMap<PathBuf, Supervised>) -> usize {
        let finished: Vec<PathBuf> = walkers
            .iter()
            .filter(|(_, w)| w.thread.is_finished())
            .map(|(user, _)| user.clone())
            .collect();

        let mut failed = 0;
        for user in finished {
            if let Some(walker) = walkers.remove(&user) {
                if self.report_exit(&user, walker.thread.join()) {
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Log how a walker ended; returns true if it failed
    fn report_exit(
        &self,
        user: &Path,
        joined: thread::Result<std::result::Result<WalkerExit, WalkError>>,
    ) -> bool {
        match joined {
            Ok(Ok(exit)) => {
                debug!(user = %user.display(), exit = ?exit, "Walker stopped");
                false
            }
            Ok(Err(e)) => {
                error!(user = %user.display(), error = %e, "Walker died, user is no longer monitored");
                true
            }
            Err(panic) => {
                let err = WorkerError::Panicked {
                    user: user.display().to_string(),
                    message: panic_message(panic.as_ref()),
                };
                error!("{}", err);
                let label = user.display().to_string();
                self.registry
                    .set_gauge(MAILDIR_WALKER_UP, &[(LABEL_USER, &label)], 0.0);
                true
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
