// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cpost-core: Domain types for the Command Post supervision core.
//!
//! Pure data — no I/O. Everything here serializes to the durable JSON
//! artifacts the supervision components exchange on disk.

pub mod macros;

pub mod agent;
pub mod clock;
pub mod config;
pub mod event;
pub mod finding;
pub mod flow;
pub mod handoff;
pub mod message;
pub mod snapshot;
pub mod spawn;
pub mod task;
pub mod time_fmt;
pub mod zone;

pub use agent::{AgentId, AgentStatus, RegistryEntry, Role};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, ConfigFile, DomainSpec, SupervisorConfig, Topology};
pub use event::{Event, EventId, EventType};
pub use finding::{Finding, FindingId, FindingStatus, Severity};
pub use flow::{FlowId, FlowPhase, ReplacementFlow};
pub use handoff::{HandoffPhase, HandoffRecord, HandoffState, HandoffTransition};
pub use message::{Message, MessageId, MessageType, Priority};
pub use snapshot::{
    FilesState, MemorySnapshot, PrdSnapshot, SnapshotDecision, SnapshotId, SnapshotState,
};
pub use spawn::{SpawnEntryId, SpawnEntryStatus, SpawnQueueEntry, SpawnRequest, SpawnRole};
pub use task::{Task, TaskAudit, TaskContext, TaskPlan, TaskStatus, TaskTimestamps};
pub use time_fmt::{format_elapsed_ms, safe_timestamp, utc_now_rfc3339};
pub use zone::{ContextUsage, ContextZone, Thresholds};
