// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-attempt state machine.
//!
//! ```text
//! Idle -> Dispatched -> (stages run) -> Aggregated -> LedgerUpdated -> Idle
//! ```
//!
//! The orchestrator owns the ledger and takes `&mut self` for an attempt,
//! so at most one attempt is in flight and the ledger has a single writer.
//! Stage results are all joined before the ledger is touched.

use std::sync::Arc;
use std::time::Duration;

use lc_adapters::Publisher;
use lc_core::{format_elapsed, BuildOutcome, Clock, CommitId, Stage};
use lc_storage::{Ledger, LedgerError};
use parking_lot::Mutex;

use crate::fanout::fan_out;
use crate::stages::StageExecutor;

/// Where the current attempt is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttemptPhase {
    #[default]
    Idle,
    Dispatched,
    Aggregated,
    LedgerUpdated,
}

lc_core::simple_display! {
    AttemptPhase {
        Idle => "idle",
        Dispatched => "dispatched",
        Aggregated => "aggregated",
        LedgerUpdated => "ledger-updated",
    }
}

/// Shared read access to the orchestrator's phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseHandle(Arc<Mutex<AttemptPhase>>);

impl PhaseHandle {
    pub fn get(&self) -> AttemptPhase {
        *self.0.lock()
    }

    fn set(&self, phase: AttemptPhase) {
        tracing::debug!(%phase, "attempt phase");
        *self.0.lock() = phase;
    }
}

/// Why a commit is not built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySucceeded,
    FailureCapReached { failures: u32, max: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Dispatch,
    Skip(SkipReason),
}

/// Result of one build attempt.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub commit: CommitId,
    pub outcomes: Vec<BuildOutcome>,
    pub succeeded: bool,
    pub published: bool,
    pub duration: Duration,
}

impl AttemptReport {
    pub fn failed_stages(&self) -> Vec<Stage> {
        self.outcomes.iter().filter(|o| !o.succeeded()).map(|o| o.stage).collect()
    }
}

pub struct Orchestrator<E, Pb, C>
where
    E: StageExecutor,
    Pb: Publisher,
    C: Clock,
{
    executor: E,
    publisher: Pb,
    ledger: Ledger<C>,
    clock: C,
    stages: Vec<Stage>,
    max_failures: u32,
    phase: PhaseHandle,
}

impl<E, Pb, C> Orchestrator<E, Pb, C>
where
    E: StageExecutor,
    Pb: Publisher,
    C: Clock,
{
    /// `stages` are dispatched concurrently on every attempt.
    pub fn new(executor: E, publisher: Pb, ledger: Ledger<C>, clock: C, stages: Vec<Stage>, max_failures: u32) -> Self {
        Self { executor, publisher, ledger, clock, stages, max_failures, phase: PhaseHandle::default() }
    }

    pub fn ledger(&self) -> &Ledger<C> {
        &self.ledger
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase.get()
    }

    pub fn phase_handle(&self) -> PhaseHandle {
        self.phase.clone()
    }

    /// Whether `commit` should be built now. Reads the ledger only.
    pub fn decide(&self, commit: &CommitId) -> Decision {
        if self.ledger.succeeded(commit) {
            return Decision::Skip(SkipReason::AlreadySucceeded);
        }
        let failures = self.ledger.failures(commit);
        if failures >= self.max_failures {
            return Decision::Skip(SkipReason::FailureCapReached { failures, max: self.max_failures });
        }
        Decision::Dispatch
    }

    /// Build `commit` if the ledger allows it.
    pub async fn run_if_needed(&mut self, commit: &CommitId) -> Result<Option<AttemptReport>, LedgerError> {
        match self.decide(commit) {
            Decision::Dispatch => self.attempt(commit).await.map(Some),
            Decision::Skip(reason) => {
                tracing::debug!(%commit, ?reason, "not building");
                Ok(None)
            }
        }
    }

    /// Run one attempt for `commit` regardless of the ledger, then record
    /// its result.
    ///
    /// Success is recorded before publishing, and publishing happens at
    /// most once per successful attempt. A failed publish is logged but
    /// does not turn the build into a failure.
    pub async fn attempt(&mut self, commit: &CommitId) -> Result<AttemptReport, LedgerError> {
        let result = self.attempt_inner(commit).await;
        self.phase.set(AttemptPhase::Idle);
        result
    }

    async fn attempt_inner(&mut self, commit: &CommitId) -> Result<AttemptReport, LedgerError> {
        let start = self.clock.now();
        self.phase.set(AttemptPhase::Dispatched);
        tracing::info!(
            %commit,
            stages = ?self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            prior_failures = self.ledger.failures(commit),
            "starting build attempt"
        );

        let outcomes = fan_out(&self.executor, &self.stages, &self.clock).await;
        self.phase.set(AttemptPhase::Aggregated);

        let succeeded = !outcomes.is_empty() && outcomes.iter().all(BuildOutcome::succeeded);
        if succeeded {
            self.ledger.record_success(commit)?;
        } else {
            let failures = self.ledger.record_failure(commit)?;
            if failures >= self.max_failures {
                tracing::warn!(%commit, failures, "failure cap reached, commit will be skipped until its ledger entry expires");
            }
        }
        self.phase.set(AttemptPhase::LedgerUpdated);

        let published = succeeded && self.publish(commit).await;
        let duration = self.clock.since(start);
        let report = AttemptReport { commit: commit.clone(), outcomes, succeeded, published, duration };
        if succeeded {
            tracing::info!(%commit, took = %format_elapsed(duration), published, "build attempt succeeded");
        } else {
            tracing::error!(
                %commit,
                took = %format_elapsed(duration),
                failed = ?report.failed_stages().iter().map(|s| s.name()).collect::<Vec<_>>(),
                "build attempt failed"
            );
        }
        Ok(report)
    }

    async fn publish(&self, commit: &CommitId) -> bool {
        match self.publisher.publish(commit).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%commit, error = %e, "publish failed");
                false
            }
        }
    }

    /// Forgive `commit`'s past failures, e.g. ones caused by a previous
    /// daemon crash.
    pub fn forgive(&mut self, commit: &CommitId) -> Result<(), LedgerError> {
        let failures = self.ledger.failures(commit);
        if failures > 0 {
            tracing::info!(%commit, failures, "forgiving earlier failures");
        }
        self.ledger.reset(commit)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
