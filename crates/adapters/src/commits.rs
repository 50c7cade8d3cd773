// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Head-commit lookups against a source hosting API.

use async_trait::async_trait;
use lc_core::{CommitId, WatchSettings};
use thiserror::Error;

/// Errors from fetching the head commit
#[derive(Debug, Error)]
pub enum CommitSourceError {
    #[error("commit request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("commit endpoint answered HTTP {0}")]
    Status(u16),
    #[error("commit response is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("commit response has no string `sha` field")]
    MissingSha,
}

/// Reports the current head commit of the tracked branch.
#[async_trait]
pub trait CommitSource: Clone + Send + Sync + 'static {
    async fn head(&self) -> Result<CommitId, CommitSourceError>;
}

/// [`CommitSource`] for a GitHub-style `commits/<branch>` endpoint.
#[derive(Clone)]
pub struct GitHubCommitSource {
    client: reqwest::Client,
    url: String,
}

impl GitHubCommitSource {
    pub fn new(settings: &WatchSettings) -> Result<Self, CommitSourceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, url: settings.url.clone() })
    }
}

#[async_trait]
impl CommitSource for GitHubCommitSource {
    async fn head(&self) -> Result<CommitId, CommitSourceError> {
        let response =
            self.client.get(&self.url).header("Accept", "application/vnd.github+json").send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CommitSourceError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_commit_body(&body)
    }
}

/// Extract the commit id from a commit-info JSON body.
pub fn parse_commit_body(body: &str) -> Result<CommitId, CommitSourceError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    value
        .get("sha")
        .and_then(serde_json::Value::as_str)
        .and_then(CommitId::parse)
        .ok_or(CommitSourceError::MissingSha)
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{CommitSource, CommitSourceError};
    use async_trait::async_trait;
    use lc_core::CommitId;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeCommitState {
        head: Option<String>,
        queued: VecDeque<Option<String>>,
        polls: usize,
    }

    /// Fake commit source for testing.
    ///
    /// Queued answers are served first, then the fixed head. `None` means
    /// the endpoint is down.
    #[derive(Clone, Default)]
    pub struct FakeCommitSource {
        inner: Arc<Mutex<FakeCommitState>>,
    }

    impl FakeCommitSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_head(head: &str) -> Self {
            let source = Self::new();
            source.set_head(Some(head));
            source
        }

        pub fn set_head(&self, head: Option<&str>) {
            self.inner.lock().head = head.map(str::to_string);
        }

        pub fn push(&self, answer: Option<&str>) {
            self.inner.lock().queued.push_back(answer.map(str::to_string));
        }

        pub fn polls(&self) -> usize {
            self.inner.lock().polls
        }
    }

    #[async_trait]
    impl CommitSource for FakeCommitSource {
        async fn head(&self) -> Result<CommitId, CommitSourceError> {
            let mut state = self.inner.lock();
            state.polls += 1;
            let answer = match state.queued.pop_front() {
                Some(answer) => answer,
                None => state.head.clone(),
            };
            match answer {
                Some(raw) => CommitId::parse(&raw).ok_or(CommitSourceError::MissingSha),
                None => Err(CommitSourceError::Status(503)),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCommitSource;

#[cfg(test)]
#[path = "commits_tests.rs"]
mod tests;
