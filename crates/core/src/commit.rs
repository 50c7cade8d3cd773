// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit identifiers.
//!
//! A `CommitId` is the content hash of a commit as reported by the source
//! host. Hosts are inconsistent about case and may pad the value, so the
//! id is trimmed and ASCII case-folded on construction: `"ABC123 "` and
//! `"abc123"` name the same commit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized, case-insensitive commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Normalize a raw identifier. Returns `None` when nothing is left
    /// after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..10).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for CommitId {
    fn eq(&self, other: &str) -> bool {
        CommitId::parse(other).is_some_and(|o| o == *self)
    }
}

impl PartialEq<&str> for CommitId {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// Error for an identifier that is empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("commit id is empty")]
pub struct EmptyCommitId;

impl TryFrom<String> for CommitId {
    type Error = EmptyCommitId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CommitId::parse(&value).ok_or(EmptyCommitId)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
