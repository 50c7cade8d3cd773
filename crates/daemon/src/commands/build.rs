// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd build <commit>` - one orchestrated attempt, then exit

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use lc_adapters::Publisher;
use lc_core::{format_elapsed, Clock, CommitId};
use lc_engine::{AttemptReport, Decision, Orchestrator, SkipReason, StageExecutor};

use super::{load_settings, parse_commit};
use crate::lifecycle::{self, DaemonLock, Paths};
use crate::ExitError;

pub async fn build(config: &Path, paths: &Paths, commit: &str, force: bool) -> Result<(), ExitError> {
    let commit = parse_commit(commit)?;
    let settings = Arc::new(load_settings(config)?);
    settings.preflight_dispatch().map_err(ExitError::fatal)?;

    let _lock = DaemonLock::acquire(&paths.lock_path).map_err(ExitError::fatal)?;
    let mut orchestrator = lifecycle::orchestrator(&settings, &paths.ledger_path).map_err(ExitError::fatal)?;
    let summary = attempt(&mut orchestrator, &commit, force).await?;
    print!("{summary}");
    Ok(())
}

/// Build `commit` unless the ledger says to skip it (or `force`), and
/// describe what happened.
pub async fn attempt<E, Pb, C>(
    orchestrator: &mut Orchestrator<E, Pb, C>,
    commit: &CommitId,
    force: bool,
) -> Result<String, ExitError>
where
    E: StageExecutor,
    Pb: Publisher,
    C: Clock,
{
    let report = if force {
        orchestrator.attempt(commit).await.map(Some)
    } else {
        orchestrator.run_if_needed(commit).await
    }
    .map_err(ExitError::fatal)?;

    let Some(report) = report else {
        return Ok(format!("{}: {}\n", commit.short(), skip_message(orchestrator.decide(commit))));
    };
    let summary = summarize(&report);
    if report.succeeded {
        Ok(summary)
    } else {
        let failed: Vec<&str> = report.failed_stages().iter().map(|s| s.name()).collect();
        Err(ExitError::failed(format!("{summary}build of {} failed: {}", commit.short(), failed.join(", "))))
    }
}

fn skip_message(decision: Decision) -> String {
    match decision {
        Decision::Skip(SkipReason::AlreadySucceeded) => "already built, skipping".to_string(),
        Decision::Skip(SkipReason::FailureCapReached { failures, max }) => {
            format!("failed {failures} of {max} allowed times, skipping (use --force or `ledger reset`)")
        }
        Decision::Dispatch => "not built".to_string(),
    }
}

/// One line per stage, then the verdict.
pub fn summarize(report: &AttemptReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let _ = write!(out, "{:<12} {:<9} {:>8}", outcome.stage.name(), outcome.status().to_string(), format_elapsed(outcome.duration));
        match (&outcome.error, outcome.exit_code) {
            (Some(error), _) => {
                let _ = write!(out, "  {error}");
            }
            (None, Some(code)) if code != 0 => {
                let _ = write!(out, "  exit {code}");
            }
            _ => {}
        }
        out.push('\n');
    }
    let verdict = if report.succeeded { "succeeded" } else { "failed" };
    let _ = write!(out, "{} {verdict} in {}", report.commit.short(), format_elapsed(report.duration));
    if report.published {
        out.push_str(", published");
    }
    out.push('\n');
    out
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
