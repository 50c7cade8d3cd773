// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How to reach a peer machine for remote command execution.

use std::fmt;
use std::path::PathBuf;

/// Authentication material for an SSH peer.
///
/// Host↔cloud links use a key file; cloud↔guest links use a password
/// because the guest images ship with a fixed local account.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    KeyFile(PathBuf),
    Password(String),
}

impl Credential {
    pub fn is_password(&self) -> bool {
        matches!(self, Credential::Password(_))
    }
}

// Passwords never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// A peer reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    /// Directory the remote command operates in.
    pub workdir: String,
}

impl RemoteTarget {
    pub const DEFAULT_PORT: u16 = 22;

    pub fn new(host: impl Into<String>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            user: user.into(),
            credential,
            workdir: String::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// `user@host` destination for ssh/rsync.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
