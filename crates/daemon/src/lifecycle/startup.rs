// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring the engine to real adapters.

use std::path::Path;
use std::sync::Arc;

use lc_adapters::{CommandPublisher, ConsoleSink, GitHubCommitSource, LocalProcessRunner, SshRunner, VirshController};
use lc_core::{Settings, SystemClock};
use lc_engine::{BuildService, CommitWatcher, Orchestrator, PollSchedule, StageRunner};
use lc_storage::Ledger;

use super::LifecycleError;

/// Stage handlers with concrete adapter types
pub type DaemonStages = StageRunner<LocalProcessRunner, SshRunner<LocalProcessRunner>, VirshController<LocalProcessRunner>>;

pub type DaemonOrchestrator = Orchestrator<DaemonStages, CommandPublisher<LocalProcessRunner>, SystemClock>;

pub type DaemonService =
    BuildService<GitHubCommitSource, DaemonStages, CommandPublisher<LocalProcessRunner>, SystemClock>;

/// Stage handlers that print forwarded output to the console.
pub fn stage_runner(settings: &Arc<Settings>) -> DaemonStages {
    let process = LocalProcessRunner::new(ConsoleSink::shared());
    let remote = SshRunner::new(process.clone(), settings.hypervisor.ssh_connect_timeout());
    let vm = VirshController::new(process.clone(), &settings.hypervisor);
    StageRunner::new(Arc::clone(settings), process, remote, vm)
}

/// Open the ledger and build an orchestrator over the dispatched stages.
///
/// The caller must hold the [`DaemonLock`](super::DaemonLock).
pub fn orchestrator(settings: &Arc<Settings>, ledger_path: &Path) -> Result<DaemonOrchestrator, LifecycleError> {
    let ledger = Ledger::open(ledger_path, settings.ledger.retention(), SystemClock)?;
    let publisher = CommandPublisher::new(
        LocalProcessRunner::new(ConsoleSink::shared()),
        settings.publish.clone(),
        &settings.build.repo_dir,
    );
    Ok(Orchestrator::new(
        stage_runner(settings),
        publisher,
        ledger,
        SystemClock,
        settings.build.dispatch.clone(),
        settings.ledger.max_build_failures,
    ))
}

/// Everything the poll loop needs.
///
/// Credentials for every dispatched stage are resolved here so a missing
/// key or password file stops startup instead of failing each attempt.
pub fn service(settings: &Arc<Settings>, ledger_path: &Path) -> Result<DaemonService, LifecycleError> {
    settings.preflight_dispatch()?;
    let source = GitHubCommitSource::new(&settings.watch)?;
    let watcher = CommitWatcher::new(source, PollSchedule::from_settings(&settings.watch), SystemClock);
    let orchestrator = orchestrator(settings, ledger_path)?;
    Ok(BuildService::new(watcher, orchestrator, settings.watch.forgive_on_startup))
}
