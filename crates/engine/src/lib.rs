// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cpost-engine: the supervision state machines.
//!
//! Everything here communicates through the durable artifacts in
//! `cpost-storage` — inbox messages, task records, snapshot files, and
//! the event log. No component shares memory with another; a restart of
//! any one of them resumes from disk.

pub mod cascade;
pub mod closeout;
pub mod completion;
pub mod error;
pub mod findings;
pub mod handoff;
pub mod monitor;
pub mod projection;
pub mod quality;
pub mod replacement;
pub mod report;
pub mod spawn_queue;
pub mod spawner;
pub mod spec_doc;
pub mod supervisor;
pub mod topology;

pub use cascade::{CascadeState, Tier};
pub use closeout::{AuditorVerdict, CloseoutManager, CloseoutResult};
pub use completion::TaskCompletionMonitor;
pub use error::EngineError;
pub use findings::FindingsRegistry;
pub use handoff::{HandoffManager, HandoffValidation};
pub use monitor::ContextMonitor;
pub use projection::{predict_handoff, HandoffPrediction};
pub use quality::{validate_machine, validate_prd, QualityCheck, QualityReport};
pub use replacement::ReplacementCoordinator;
pub use report::ProjectData;
pub use spawn_queue::{BudgetCheck, SpawnQueue};
pub use spawner::ReplacementSpawner;
pub use supervisor::Supervisor;
pub use topology::TopologyIndex;
