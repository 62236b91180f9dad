// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cpost-storage: durable filesystem stores for the supervision core.
//!
//! Every shared artifact lives under `<project>/.command-post/`. All
//! mutations are transactional: writes go through a temp-file + rename,
//! and read-modify-write cycles hold a per-file advisory lock. Any
//! component can crash and resume by re-reading disk.

mod error;
mod event_log;
mod fsio;
mod handoff_state;
mod mailbox;
mod paths;
mod registry;
mod snapshots;
mod spawn_queue;
mod status_cache;
mod tasks;

pub use error::StorageError;
pub use event_log::{EventLog, EventQuery};
pub use fsio::{read_json_opt, write_atomic, write_json_atomic, FileLock};
pub use handoff_state::HandoffStateStore;
pub use mailbox::{MailboxStore, MessageQuery, SendOptions};
pub use paths::StateDir;
pub use registry::AgentRegistry;
pub use snapshots::{snapshot_percentage, SnapshotStore};
pub use spawn_queue::{SpawnQueueStore, SpawnRequestStore};
pub use status_cache::StatusCache;
pub use tasks::TaskStore;
