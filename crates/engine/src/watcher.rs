// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit watcher: head-commit polling that never fails outward.

use std::time::{Duration, Instant};

use lc_adapters::CommitSource;
use lc_core::{Clock, CommitId};

use crate::schedule::PollSchedule;

/// Polls a [`CommitSource`] and tracks the last observed head.
pub struct CommitWatcher<S: CommitSource, C: Clock> {
    source: S,
    clock: C,
    schedule: PollSchedule,
    started: Instant,
    last_seen: Option<CommitId>,
}

impl<S: CommitSource, C: Clock> CommitWatcher<S, C> {
    /// Uptime for the poll schedule is measured from construction.
    pub fn new(source: S, schedule: PollSchedule, clock: C) -> Self {
        let started = clock.now();
        Self { source, clock, schedule, started, last_seen: None }
    }

    /// Fetch the current head. Any failure reads as `None` (unavailable)
    /// and is retried on the next tick.
    pub async fn poll(&mut self) -> Option<CommitId> {
        match self.source.head().await {
            Ok(head) => {
                if self.last_seen.as_ref() != Some(&head) {
                    tracing::info!(commit = %head, previous = ?self.last_seen.as_ref().map(CommitId::as_str), "head commit changed");
                    self.last_seen = Some(head.clone());
                }
                Some(head)
            }
            Err(e) => {
                tracing::warn!(error = %e, "commit check failed");
                None
            }
        }
    }

    pub fn last_seen(&self) -> Option<&CommitId> {
        self.last_seen.as_ref()
    }

    pub fn uptime(&self) -> Duration {
        self.clock.since(self.started)
    }

    /// How long to wait before the next poll.
    pub fn next_delay(&self) -> Duration {
        self.schedule.delay_for(self.uptime())
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
