// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Build engine: commit watching, stage handling and orchestration.

pub mod artifacts;
pub mod compile;
mod error;
pub mod fanout;
pub mod orchestrator;
pub mod schedule;
pub mod service;
pub mod stages;
pub mod watcher;

pub use compile::CompilePlan;
pub use error::StageError;
pub use fanout::fan_out;
pub use orchestrator::{AttemptPhase, AttemptReport, Decision, Orchestrator, PhaseHandle, SkipReason};
pub use schedule::PollSchedule;
pub use service::BuildService;
pub use stages::{StageExecutor, StageRunner};
pub use watcher::CommitWatcher;

#[cfg(any(test, feature = "test-support"))]
pub use stages::{FakeStage, FakeStageExecutor};
