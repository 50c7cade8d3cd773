// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-attempt ledger.
//!
//! Remembers, per commit, how many build attempts failed and whether one
//! succeeded, so a restarted daemon neither rebuilds finished commits nor
//! retries broken ones forever. Entries expire `retention` after their last
//! write. Expiry is checked at read time: an expired entry reads as the
//! default record and is dropped on the next save.
//!
//! The whole ledger is one small JSON file, rewritten atomically (temp file
//! + rename) after every mutation. A single owner mutates it through
//! `&mut self`, so there is no internal locking.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lc_core::{Clock, CommitId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current ledger file schema version
pub const CURRENT_LEDGER_VERSION: u32 = 1;

const MAX_BAK_FILES: u32 = 3;

/// Errors that can occur in ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger IO error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("ledger serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger {path} has schema v{found}, newer than this build supports")]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

/// What the ledger knows about one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAttemptRecord {
    pub failure_count: u32,
    pub succeeded: bool,
    /// Wall-clock ms after which the record reads as absent.
    pub expires_at_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(rename = "v")]
    version: u32,
    saved_at: DateTime<Utc>,
    entries: BTreeMap<CommitId, BuildAttemptRecord>,
}

/// Persistent commit → build-attempt record map with per-entry expiry.
pub struct Ledger<C: Clock> {
    path: PathBuf,
    retention: Duration,
    clock: C,
    entries: BTreeMap<CommitId, BuildAttemptRecord>,
}

impl<C: Clock> Ledger<C> {
    /// Open (or create) the ledger at `path`.
    ///
    /// The file is written once during open so an unwritable location
    /// fails here, at startup, rather than after the first build. A file
    /// that does not parse is moved aside to `.bak` and replaced with an
    /// empty ledger.
    pub fn open(path: impl Into<PathBuf>, retention: Duration, clock: C) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<LedgerFile>(&bytes) {
                Ok(file) if file.version > CURRENT_LEDGER_VERSION => {
                    return Err(LedgerError::UnsupportedVersion { path, found: file.version });
                }
                Ok(file) => file.entries,
                Err(e) => {
                    let bak = rotate_bak_path(&path);
                    tracing::warn!(
                        path = %path.display(),
                        backup = %bak.display(),
                        error = %e,
                        "ledger file is corrupt, starting empty"
                    );
                    fs::rename(&path, &bak).map_err(|source| io_err(&path, source))?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(io_err(&path, source)),
        };

        let mut ledger = Self { path, retention, clock, entries };
        ledger.save()?;
        tracing::info!(
            path = %ledger.path.display(),
            live = ledger.live_count(),
            "opened build ledger"
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded failures for `commit`; 0 when absent or expired.
    pub fn failures(&self, commit: &CommitId) -> u32 {
        self.live(commit).map(|r| r.failure_count).unwrap_or(0)
    }

    /// Whether a build of `commit` succeeded within the retention window.
    pub fn succeeded(&self, commit: &CommitId) -> bool {
        self.live(commit).is_some_and(|r| r.succeeded)
    }

    /// The live record for `commit`, if any.
    pub fn record(&self, commit: &CommitId) -> Option<BuildAttemptRecord> {
        self.live(commit).copied()
    }

    /// Number of unexpired entries.
    pub fn live_count(&self) -> usize {
        let now = self.clock.epoch_ms();
        self.entries.values().filter(|r| r.expires_at_ms > now).count()
    }

    /// Count one more failed attempt and restart the expiry window.
    /// Returns the new failure count.
    pub fn record_failure(&mut self, commit: &CommitId) -> Result<u32, LedgerError> {
        let record = self.touch(commit);
        record.failure_count = record.failure_count.saturating_add(1);
        let count = record.failure_count;
        self.save()?;
        Ok(count)
    }

    /// Mark `commit` as built and restart the expiry window.
    pub fn record_success(&mut self, commit: &CommitId) -> Result<(), LedgerError> {
        self.touch(commit).succeeded = true;
        self.save()
    }

    /// Forgive past failures of `commit`. No entry is created for an
    /// unknown commit.
    pub fn reset(&mut self, commit: &CommitId) -> Result<(), LedgerError> {
        if self.live(commit).is_none() {
            return Ok(());
        }
        self.touch(commit).failure_count = 0;
        self.save()
    }

    fn live(&self, commit: &CommitId) -> Option<&BuildAttemptRecord> {
        let now = self.clock.epoch_ms();
        self.entries.get(commit).filter(|r| r.expires_at_ms > now)
    }

    /// Get the live record for `commit` (fresh default if absent or
    /// expired) with its expiry pushed out to now + retention.
    fn touch(&mut self, commit: &CommitId) -> &mut BuildAttemptRecord {
        let now = self.clock.epoch_ms();
        let expires_at_ms = now.saturating_add(self.retention.as_millis() as u64);
        let record = self.entries.entry(commit.clone()).or_default();
        if record.expires_at_ms <= now {
            *record = BuildAttemptRecord::default();
        }
        record.expires_at_ms = expires_at_ms;
        record
    }

    /// Drop expired entries and atomically rewrite the file.
    fn save(&mut self) -> Result<(), LedgerError> {
        let now = self.clock.epoch_ms();
        self.entries.retain(|_, r| r.expires_at_ms > now);

        let file = LedgerFile {
            version: CURRENT_LEDGER_VERSION,
            saved_at: Utc::now(),
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut out = File::create(&tmp).map_err(|source| io_err(&tmp, source))?;
            out.write_all(&bytes).map_err(|source| io_err(&tmp, source))?;
            out.sync_all().map_err(|source| io_err(&tmp, source))?;
        }
        fs::rename(&tmp, &self.path).map_err(|source| io_err(&self.path, source))?;
        Ok(())
    }
}

/// Live entries of the ledger at `path`, read without writing anything.
///
/// Safe to call while another process owns the ledger. A missing file
/// reads as empty; a corrupt one is an error rather than moved aside.
pub fn inspect<C: Clock>(path: &Path, clock: &C) -> Result<BTreeMap<CommitId, BuildAttemptRecord>, LedgerError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => return Err(io_err(path, source)),
    };
    let file: LedgerFile = serde_json::from_slice(&bytes)?;
    if file.version > CURRENT_LEDGER_VERSION {
        return Err(LedgerError::UnsupportedVersion { path: path.to_path_buf(), found: file.version });
    }
    let now = clock.epoch_ms();
    Ok(file.entries.into_iter().filter(|(_, r)| r.expires_at_ms > now).collect())
}

fn io_err(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io { path: path.to_path_buf(), source }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
