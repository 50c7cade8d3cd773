// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd` subcommand implementations

pub mod build;
pub mod install;
pub mod ledger;
pub mod run;
pub mod stage;

use std::path::Path;

use lc_core::{CommitId, Settings};

use crate::ExitError;

/// Read and validate the config file; any problem is fatal.
pub(crate) fn load_settings(path: &Path) -> Result<Settings, ExitError> {
    Settings::load(path).map_err(|e| ExitError::fatal(format!("{}: {e}", path.display())))
}

pub(crate) fn parse_commit(raw: &str) -> Result<CommitId, ExitError> {
    CommitId::parse(raw).ok_or_else(|| ExitError::fatal("commit id must not be empty"))
}
