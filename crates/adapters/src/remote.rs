// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote command execution over SSH.
//!
//! Uses the system `ssh` client rather than an in-process SSH stack, so
//! host keys, agents and `~/.ssh/config` behave exactly as they do for an
//! operator at the shell. Password logins go through `sshpass -e`, which
//! reads the password from `SSHPASS` in the child environment.

use std::time::Duration;

use async_trait::async_trait;
use lc_core::{Credential, RemoteTarget};
use thiserror::Error;

use crate::net;
use crate::subprocess::{CommandSpec, ProcessError, ProcessRunner};

/// ssh reserves this exit code for its own failures.
const SSH_CONNECT_FAILURE: i32 = 255;

/// Errors from remote execution. A remote command that ran and exited
/// nonzero is not an error; it is the returned exit code.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{target} is unreachable: {source}")]
    Unreachable { target: String, source: std::io::Error },
    #[error("ssh could not establish a session with {target}")]
    Connect { target: String },
    #[error("failed to run ssh for {target}: {source}")]
    Process { target: String, source: ProcessError },
}

/// Runs commands on a peer machine.
#[async_trait]
pub trait RemoteRunner: Clone + Send + Sync + 'static {
    /// Run `command` on `target`, streaming its output under `label`, and
    /// return its exit code. Waits as long as the command runs.
    async fn run(&self, target: &RemoteTarget, command: &str, label: &str) -> Result<i32, RemoteError>;
}

/// [`RemoteRunner`] that spawns the `ssh` client through a [`ProcessRunner`].
#[derive(Clone)]
pub struct SshRunner<P: ProcessRunner> {
    process: P,
    connect_timeout: Duration,
}

impl<P: ProcessRunner> SshRunner<P> {
    pub fn new(process: P, connect_timeout: Duration) -> Self {
        Self { process, connect_timeout }
    }
}

#[async_trait]
impl<P: ProcessRunner> RemoteRunner for SshRunner<P> {
    async fn run(&self, target: &RemoteTarget, command: &str, label: &str) -> Result<i32, RemoteError> {
        net::probe(&target.host, target.port, self.connect_timeout)
            .await
            .map_err(|source| RemoteError::Unreachable { target: target.to_string(), source })?;

        let spec = ssh_command(target, self.connect_timeout).arg(target.destination()).arg(command);
        tracing::info!(%target, command, "running remote command");
        let code = self
            .process
            .run(&spec, label)
            .await
            .map_err(|source| RemoteError::Process { target: target.to_string(), source })?;
        if code == SSH_CONNECT_FAILURE {
            return Err(RemoteError::Connect { target: target.to_string() });
        }
        Ok(code)
    }
}

/// The ssh invocation for `target` up to (not including) the destination.
///
/// Shared with rsync, which takes the same invocation as its transport.
pub fn ssh_command(target: &RemoteTarget, connect_timeout: Duration) -> CommandSpec {
    let base = match &target.credential {
        Credential::KeyFile(key) => CommandSpec::new("ssh")
            .arg("-i")
            .arg(key.display().to_string())
            .args(["-o", "BatchMode=yes", "-o", "IdentitiesOnly=yes"]),
        Credential::Password(password) => CommandSpec::new("sshpass")
            .args(["-e", "ssh"])
            .args(["-o", "PreferredAuthentications=password,keyboard-interactive"])
            .args(["-o", "PubkeyAuthentication=no"])
            .env("SSHPASS", password.as_str()),
    };
    base.arg("-o")
        .arg(format!("ConnectTimeout={}", connect_timeout.as_secs().max(1)))
        .args(["-o", "StrictHostKeyChecking=accept-new"])
        .arg("-p")
        .arg(target.port.to_string())
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{RemoteError, RemoteRunner};
    use async_trait::async_trait;
    use lc_core::RemoteTarget;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted result for a host
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeRemoteResult {
        Exit(i32),
        Unreachable,
        Connect,
    }

    /// Recorded remote invocation
    #[derive(Debug, Clone)]
    pub struct RemoteCall {
        pub target: RemoteTarget,
        pub command: String,
        pub label: String,
    }

    #[derive(Default)]
    struct FakeRemoteState {
        results: HashMap<String, FakeRemoteResult>,
        calls: Vec<RemoteCall>,
    }

    /// Fake remote runner for testing. Hosts without a scripted result exit 0.
    #[derive(Clone, Default)]
    pub struct FakeRemoteRunner {
        inner: Arc<Mutex<FakeRemoteState>>,
    }

    impl FakeRemoteRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_result(&self, host: &str, result: FakeRemoteResult) {
            self.inner.lock().results.insert(host.to_string(), result);
        }

        pub fn calls(&self) -> Vec<RemoteCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl RemoteRunner for FakeRemoteRunner {
        async fn run(&self, target: &RemoteTarget, command: &str, label: &str) -> Result<i32, RemoteError> {
            let mut state = self.inner.lock();
            state.calls.push(RemoteCall {
                target: target.clone(),
                command: command.to_string(),
                label: label.to_string(),
            });
            match state.results.get(&target.host).copied().unwrap_or(FakeRemoteResult::Exit(0)) {
                FakeRemoteResult::Exit(code) => Ok(code),
                FakeRemoteResult::Unreachable => Err(RemoteError::Unreachable {
                    target: target.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "fake"),
                }),
                FakeRemoteResult::Connect => Err(RemoteError::Connect { target: target.to_string() }),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemoteResult, FakeRemoteRunner, RemoteCall};

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
