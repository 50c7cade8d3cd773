// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd ledger` - inspect or forgive recorded build attempts

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use chrono::DateTime;
use lc_core::{CommitId, SystemClock};
use lc_storage::{BuildAttemptRecord, Ledger};

use super::{load_settings, parse_commit};
use crate::lifecycle::{DaemonLock, Paths};
use crate::ExitError;

/// Print live ledger entries, or just the one for `commit`.
///
/// Read-only, so it is safe while the daemon runs.
pub fn show(paths: &Paths, commit: Option<&str>) -> Result<(), ExitError> {
    let entries = lc_storage::inspect(&paths.ledger_path, &SystemClock).map_err(ExitError::fatal)?;
    let commit = commit.map(parse_commit).transpose()?;
    print!("{}", render(&entries, commit.as_ref()));
    Ok(())
}

/// Zero `commit`'s failure count. Refused while a daemon owns the ledger.
pub fn reset(config: &Path, paths: &Paths, commit: &str) -> Result<(), ExitError> {
    let commit = parse_commit(commit)?;
    let settings = load_settings(config)?;
    let _lock = DaemonLock::acquire(&paths.lock_path)
        .map_err(|e| ExitError::fatal(format!("{e}; stop it before editing the ledger")))?;

    let mut ledger =
        Ledger::open(&paths.ledger_path, settings.ledger.retention(), SystemClock).map_err(ExitError::fatal)?;
    let before = ledger.failures(&commit);
    ledger.reset(&commit).map_err(ExitError::fatal)?;
    println!("{}: failures {before} -> 0", commit.short());
    Ok(())
}

pub fn render(entries: &BTreeMap<CommitId, BuildAttemptRecord>, only: Option<&CommitId>) -> String {
    let mut out = String::new();
    match only {
        Some(commit) => match entries.get(commit) {
            Some(record) => push_entry(&mut out, commit, record),
            None => {
                let _ = writeln!(out, "{commit}: no record");
            }
        },
        None if entries.is_empty() => out.push_str("ledger is empty\n"),
        None => {
            for (commit, record) in entries {
                push_entry(&mut out, commit, record);
            }
        }
    }
    out
}

fn push_entry(out: &mut String, commit: &CommitId, record: &BuildAttemptRecord) {
    let expires = DateTime::from_timestamp_millis(record.expires_at_ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "?".to_string());
    let _ = writeln!(
        out,
        "{commit}  failures={}  succeeded={}  expires={expires}",
        record.failure_count, record.succeeded
    );
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
