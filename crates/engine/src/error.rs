// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage failure taxonomy.

use lc_adapters::{ProcessError, RemoteError, VmError};
use lc_core::{ConfigError, Stage};
use thiserror::Error;

/// Why a stage failed. Every variant becomes a Failed outcome for the
/// attempt; none of them stops the daemon.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error("{what} exited with code {code}")]
    Exit { what: String, code: i32 },

    #[error("cargo build{} for {target} exited with code {code}", profile_flag(.release))]
    Compile { target: String, release: bool, code: i32 },

    #[error("dependent stages failed: {}", join(.failed))]
    Dependents { failed: Vec<Stage> },

    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl StageError {
    /// Exit code of the command that failed, when there was one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StageError::Exit { code, .. } | StageError::Compile { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn join(stages: &[Stage]) -> String {
    stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
}

fn profile_flag(release: &bool) -> &'static str {
    if *release {
        " --release"
    } else {
        ""
    }
}
