// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The poll loop: watch, decide, build, sleep.

use lc_adapters::{CommitSource, Publisher};
use lc_core::Clock;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{AttemptReport, Orchestrator};
use crate::stages::StageExecutor;
use crate::watcher::CommitWatcher;

/// Single control loop tying the watcher to the orchestrator.
pub struct BuildService<S, E, Pb, C>
where
    S: CommitSource,
    E: StageExecutor,
    Pb: Publisher,
    C: Clock,
{
    watcher: CommitWatcher<S, C>,
    orchestrator: Orchestrator<E, Pb, C>,
    forgive_pending: bool,
}

impl<S, E, Pb, C> BuildService<S, E, Pb, C>
where
    S: CommitSource,
    E: StageExecutor,
    Pb: Publisher,
    C: Clock,
{
    /// With `forgive_on_startup`, the first head seen after start has its
    /// failure count reset: those failures most likely came from the
    /// crash this start is recovering from.
    pub fn new(watcher: CommitWatcher<S, C>, orchestrator: Orchestrator<E, Pb, C>, forgive_on_startup: bool) -> Self {
        Self { watcher, orchestrator, forgive_pending: forgive_on_startup }
    }

    pub fn orchestrator(&self) -> &Orchestrator<E, Pb, C> {
        &self.orchestrator
    }

    /// One poll-and-maybe-build step. Never fails: every error is logged
    /// and retried on a later tick.
    pub async fn tick(&mut self) -> Option<AttemptReport> {
        let head = self.watcher.poll().await?;

        if self.forgive_pending {
            self.forgive_pending = false;
            if let Err(e) = self.orchestrator.forgive(&head) {
                tracing::error!(commit = %head, error = %e, "could not reset failures on startup");
            }
        }

        match self.orchestrator.run_if_needed(&head).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(commit = %head, error = %e, "could not update build ledger");
                None
            }
        }
    }

    /// Tick until `shutdown` fires.
    ///
    /// Shutdown also abandons an attempt in flight. Its commit then has
    /// neither a success nor a failure recorded, so it is retried after
    /// restart.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("poll loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.tick() => {}
            }
            let delay = self.watcher.next_delay();
            tracing::debug!(delay_secs = delay.as_secs(), "sleeping until next poll");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("poll loop stopped");
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
