// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-stage results of a build attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Terminal state of one dispatched stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

crate::simple_display! {
    OutcomeStatus {
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// Result of running one stage within an attempt.
///
/// `exit_code` is `None` when the stage never produced one (unreachable
/// peer, network timeout, panic inside the handler); `error` then says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub stage: Stage,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub error: Option<String>,
}

impl BuildOutcome {
    /// Stage ran to completion with the given exit code.
    pub fn exited(stage: Stage, exit_code: i32, duration: Duration) -> Self {
        Self { stage, exit_code: Some(exit_code), duration, error: None }
    }

    /// Stage failed before producing an exit code.
    pub fn errored(stage: Stage, error: impl Into<String>, duration: Duration) -> Self {
        Self { stage, exit_code: None, duration, error: Some(error.into()) }
    }

    pub fn status(&self) -> OutcomeStatus {
        if self.error.is_none() && self.exit_code == Some(0) {
            OutcomeStatus::Succeeded
        } else {
            OutcomeStatus::Failed
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status() == OutcomeStatus::Succeeded
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
