// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Downstream publishing after a fully successful build.

use std::path::PathBuf;

use async_trait::async_trait;
use lc_core::{CommitId, PublishSettings};
use thiserror::Error;

use crate::subprocess::{CommandSpec, ProcessError, ProcessRunner};

const LABEL: &str = "[ publish ] ";

/// Errors from the publish step
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("publish command exited with code {0}")]
    Exit(i32),
}

/// Publishes the artifacts of a built commit.
#[async_trait]
pub trait Publisher: Clone + Send + Sync + 'static {
    async fn publish(&self, commit: &CommitId) -> Result<(), PublishError>;
}

/// [`Publisher`] that runs a configured command in the repository.
///
/// The commit id is exported as `LCLOUD_COMMIT`. With no command
/// configured, publishing is a logged no-op.
#[derive(Clone)]
pub struct CommandPublisher<P: ProcessRunner> {
    process: P,
    settings: Option<PublishSettings>,
    repo_dir: PathBuf,
}

impl<P: ProcessRunner> CommandPublisher<P> {
    pub fn new(process: P, settings: Option<PublishSettings>, repo_dir: impl Into<PathBuf>) -> Self {
        Self { process, settings, repo_dir: repo_dir.into() }
    }
}

#[async_trait]
impl<P: ProcessRunner> Publisher for CommandPublisher<P> {
    async fn publish(&self, commit: &CommitId) -> Result<(), PublishError> {
        let Some(settings) = &self.settings else {
            tracing::info!(%commit, "no publish command configured");
            return Ok(());
        };
        let cwd = settings.cwd.clone().unwrap_or_else(|| self.repo_dir.clone());
        let spec = CommandSpec::from_line(&settings.command)?.cwd(cwd).env("LCLOUD_COMMIT", commit.as_str());
        tracing::info!(%commit, command = %spec, "publishing");
        match self.process.run(&spec, LABEL).await? {
            0 => Ok(()),
            code => Err(PublishError::Exit(code)),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{PublishError, Publisher};
    use async_trait::async_trait;
    use lc_core::CommitId;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakePublishState {
        published: Vec<CommitId>,
        fail: bool,
    }

    /// Fake publisher for testing
    #[derive(Clone, Default)]
    pub struct FakePublisher {
        inner: Arc<Mutex<FakePublishState>>,
    }

    impl FakePublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every publish fail (after recording it).
        pub fn fail(&self) {
            self.inner.lock().fail = true;
        }

        pub fn published(&self) -> Vec<CommitId> {
            self.inner.lock().published.clone()
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, commit: &CommitId) -> Result<(), PublishError> {
            let mut state = self.inner.lock();
            state.published.push(commit.clone());
            if state.fail {
                return Err(PublishError::Exit(1));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePublisher;

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
