// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent stage dispatch with join semantics.

use std::any::Any;
use std::time::Duration;

use lc_core::{format_elapsed, BuildOutcome, Clock, Stage};
use tokio::task::{JoinError, JoinSet};

use crate::error::StageError;
use crate::stages::StageExecutor;

/// Dispatch every stage concurrently and wait until all of them reach a
/// terminal state.
///
/// Returns one outcome per stage, in input order. Errors and panics in a
/// stage become Failed outcomes; they never escape this function.
pub async fn fan_out<E, C>(executor: &E, stages: &[Stage], clock: &C) -> Vec<BuildOutcome>
where
    E: StageExecutor,
    C: Clock,
{
    let mut set = JoinSet::new();
    for (index, &stage) in stages.iter().enumerate() {
        let executor = executor.clone();
        let clock = clock.clone();
        set.spawn(async move {
            let start = clock.now();
            // The inner task is the panic boundary: its JoinError carries
            // the payload while this task still knows which stage it was.
            let joined = tokio::spawn(async move { executor.dispatch(stage).await }).await;
            (index, outcome_for(stage, joined, clock.since(start)))
        });
    }

    let mut outcomes: Vec<Option<BuildOutcome>> = vec![None; stages.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                log_outcome(&outcome);
                outcomes[index] = Some(outcome);
            }
            Err(e) => tracing::error!(error = %e, "stage supervisor task failed"),
        }
    }

    stages
        .iter()
        .zip(outcomes)
        .map(|(&stage, outcome)| {
            outcome.unwrap_or_else(|| BuildOutcome::errored(stage, "stage task was lost", Duration::ZERO))
        })
        .collect()
}

fn outcome_for(stage: Stage, joined: Result<Result<(), StageError>, JoinError>, duration: Duration) -> BuildOutcome {
    match joined {
        Ok(Ok(())) => BuildOutcome::exited(stage, 0, duration),
        Ok(Err(e)) => BuildOutcome { stage, exit_code: e.exit_code(), duration, error: Some(e.to_string()) },
        Err(join) => {
            let message = match join.try_into_panic() {
                Ok(payload) => panic_message(payload.as_ref()),
                Err(join) => join.to_string(),
            };
            BuildOutcome::errored(stage, StageError::Panicked(message).to_string(), duration)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_outcome(outcome: &BuildOutcome) {
    let took = format_elapsed(outcome.duration);
    match &outcome.error {
        None if outcome.succeeded() => tracing::info!(stage = %outcome.stage, %took, "stage succeeded"),
        None => tracing::error!(stage = %outcome.stage, %took, code = ?outcome.exit_code, "stage failed"),
        Some(error) => tracing::error!(stage = %outcome.stage, %took, error = %error, "stage failed"),
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
