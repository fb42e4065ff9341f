//! Per-user Maildir walkers
//!
//! ```text
//!   UserHandle ── trigger ──► UserMaildir (thread "walker-<user>")
//!              ── shutdown ─►   │
//!                               ├─ walk_tree: sorted pre-order DFS
//!                               │    ├─ WatchSet::add(dir)
//!                               │    └─ StructuralChecksum::update(path)
//!                               ├─ publish_walk ──► MetricsSink
//!                               └─ WalkReport ────► done channel
//! ```

pub mod tree;
pub mod user;

pub use tree::{walk_tree, WalkResult};
pub use user::{
    publish_walk, TriggerOutcome, UserHandle, UserMaildir, WalkReport, WalkerExit, WalkerHandle,
};
