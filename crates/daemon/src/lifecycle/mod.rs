// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: paths, the instance lock, wiring and
//! shutdown.

mod shutdown;
mod startup;

pub use shutdown::shutdown_signal;
pub use startup::{orchestrator, service, stage_runner, DaemonOrchestrator, DaemonService, DaemonStages};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use lc_adapters::CommitSourceError;
use lc_core::ConfigError;
use lc_storage::LedgerError;
use thiserror::Error;

/// Errors that stop the daemon from starting.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine home directory; set LCLOUD_CONFIG and LCLOUD_STATE_DIR")]
    NoHome,

    #[error("another lcloudd{} holds {}", pid_suffix(.pid), .path.display())]
    LockHeld { path: PathBuf, pid: Option<u32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("commit source: {0}")]
    CommitSource(#[from] CommitSourceError),
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (pid {p})")).unwrap_or_default()
}

/// Files under the state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/lcloud)
    pub state_dir: PathBuf,
    /// Lock/PID file held by the running daemon
    pub lock_path: PathBuf,
    /// Build-attempt ledger
    pub ledger_path: PathBuf,
    /// Directory of daily-rotated daemon logs
    pub logs_path: PathBuf,
}

impl Paths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            lock_path: state_dir.join("lcloudd.pid"),
            ledger_path: state_dir.join("ledger.json"),
            logs_path: state_dir.join("logs"),
            state_dir,
        }
    }

    /// Paths for the state directory chosen by the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::new(crate::env::state_dir()?))
    }
}

/// Exclusive hold on the lock file. Only the holder writes the ledger.
///
/// The lock is released when this value is dropped (or the process dies).
#[derive(Debug)]
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    /// Take the lock and write our PID into it.
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Don't truncate before holding the lock: that would wipe the
        // running daemon's PID.
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(LifecycleError::LockHeld { path: path.to_path_buf(), pid: holder_pid(path) });
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

/// PID recorded in the lock file, if any.
pub fn holder_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
