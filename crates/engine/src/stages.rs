// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage handlers.
//!
//! A process *performs* a stage when it plays that role itself, and
//! *dispatches* a stage when it makes sure the role gets played, which for
//! the cloud and the guests means reaching a peer:
//!
//! | stage | dispatch                                      | perform                          |
//! |-------|-----------------------------------------------|----------------------------------|
//! | host  | perform locally                               | compile host targets             |
//! | cloud | rsync up, run the cloud role over SSH, rsync back | fan out every guest, join    |
//! | guest | boot, wait for network, run the role over SSH, throttle | compile guest targets  |
//!
//! The host compile and the cloud's pull both write the local `target/`
//! directory. A runner lets only one of them at a time in, so the pull
//! lands after a concurrently dispatched host build has finished.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lc_adapters::{rsync, CommandSpec, ProcessRunner, RemoteRunner, VmController, VmError};
use lc_core::{format_elapsed, CommandLine, ConfigError, Settings, Stage, SystemClock};

use crate::artifacts;
use crate::compile::{compile, CompilePlan};
use crate::error::StageError;
use crate::fanout::fan_out;

/// How long a guest waits for its shared workdir to appear after its
/// prepare commands (re)mount it.
const WORKDIR_SETTLE: Duration = Duration::from_secs(2);

/// Runs one stage to a terminal state.
#[async_trait]
pub trait StageExecutor: Clone + Send + Sync + 'static {
    async fn dispatch(&self, stage: Stage) -> Result<(), StageError>;
}

/// The real stage handlers, wired to the process, SSH and VM adapters.
#[derive(Clone)]
pub struct StageRunner<P, R, V>
where
    P: ProcessRunner,
    R: RemoteRunner,
    V: VmController,
{
    settings: Arc<Settings>,
    process: P,
    remote: R,
    vm: V,
    target_dir: Arc<tokio::sync::Mutex<()>>,
}

impl<P, R, V> StageRunner<P, R, V>
where
    P: ProcessRunner,
    R: RemoteRunner,
    V: VmController,
{
    pub fn new(settings: Arc<Settings>, process: P, remote: R, vm: V) -> Self {
        Self { settings, process, remote, vm, target_dir: Arc::default() }
    }

    /// Play `stage`'s role on this machine.
    pub async fn perform(&self, stage: Stage) -> Result<(), StageError> {
        let start = Instant::now();
        tracing::info!(%stage, "performing stage");
        let result = match stage {
            Stage::Host => self.perform_host().await,
            Stage::Cloud => self.perform_cloud().await,
            Stage::GuestWin | Stage::GuestMac => self.perform_guest(stage).await,
        };
        match &result {
            Ok(()) => tracing::info!(%stage, took = %format_elapsed(start.elapsed()), "stage performed"),
            Err(e) => tracing::error!(%stage, took = %format_elapsed(start.elapsed()), error = %e, "stage failed"),
        }
        result
    }

    async fn perform_host(&self) -> Result<(), StageError> {
        let host = self
            .settings
            .host
            .as_ref()
            .ok_or(ConfigError::MissingSection { stage: Stage::Host, section: "host" })?;
        let label = Stage::Host.label();
        let _target_dir = self.target_dir.lock().await;
        self.best_effort(&host.prepare, Some(&self.settings.build.repo_dir), &label).await;
        compile(&self.process, &CompilePlan::for_host(&self.settings.build, host), &label).await
    }

    async fn perform_cloud(&self) -> Result<(), StageError> {
        let label = Stage::Cloud.label();
        let (prepare, finish) = match &self.settings.cloud {
            Some(cloud) => (cloud.prepare.as_slice(), cloud.finish.as_slice()),
            None => (&[][..], &[][..]),
        };
        self.best_effort(prepare, None, &label).await;

        let guests: Vec<Stage> = self.settings.guests.iter().map(|g| g.stage).collect();
        if guests.is_empty() {
            tracing::warn!("no guests configured, cloud has nothing to build");
        }
        let outcomes = fan_out(self, &guests, &SystemClock).await;

        self.best_effort(finish, None, &label).await;

        let failed: Vec<Stage> = outcomes.iter().filter(|o| !o.succeeded()).map(|o| o.stage).collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StageError::Dependents { failed })
        }
    }

    async fn perform_guest(&self, stage: Stage) -> Result<(), StageError> {
        let guest = self.settings.guest(stage).ok_or(ConfigError::MissingSection { stage, section: "guests" })?;
        let label = stage.label();
        self.best_effort(&guest.prepare, None, &label).await;

        let plan = CompilePlan::for_guest(&self.settings.build, guest);
        wait_for_dir(&plan.workdir, WORKDIR_SETTLE).await;
        compile(&self.process, &plan, &label).await
    }

    async fn dispatch_cloud(&self) -> Result<(), StageError> {
        let cloud = self
            .settings
            .cloud
            .as_ref()
            .ok_or(ConfigError::MissingSection { stage: Stage::Cloud, section: "cloud" })?;
        let target = self.settings.cloud_target()?;
        let timeout = self.settings.hypervisor.ssh_connect_timeout();
        let repo_dir = &self.settings.build.repo_dir;
        let label = Stage::Cloud.label();

        if cloud.sync {
            tracing::info!(%target, "copying repository to cloud");
            self.checked(&rsync::push_repo(&target, repo_dir, timeout), &label, "rsync to cloud").await?;
        }

        let code = self.remote.run(&target, &cloud.command, &label).await?;

        // Pull whatever the guests produced even when one of them failed
        let pulled = if cloud.sync {
            let _target_dir = self.target_dir.lock().await;
            tracing::info!(%target, "copying built files back");
            self.checked(&rsync::pull_target(&target, repo_dir, timeout), &label, "rsync from cloud").await
        } else {
            Ok(())
        };

        if code != 0 {
            return Err(StageError::Exit { what: "cloud command".to_string(), code });
        }
        pulled
    }

    async fn dispatch_guest(&self, stage: Stage) -> Result<(), StageError> {
        let guest = self.settings.guest(stage).ok_or(ConfigError::MissingSection { stage, section: "guests" })?;
        let hypervisor = &self.settings.hypervisor;
        let domain = guest.domain.as_str();

        if let Err(e) = self.vm.ensure_running(domain).await {
            tracing::warn!(%stage, domain, error = %e, "could not start guest, trying anyway");
        }

        // A guest that is still booting may not hold a lease yet, so the
        // address lookup shares the network deadline.
        let deadline = Instant::now() + hypervisor.network_timeout();
        let ip = loop {
            match self.vm.resolve_ip(domain, guest.ip.as_deref()).await {
                Ok(ip) => break ip,
                Err(e @ VmError::NoLease { .. }) if Instant::now() < deadline => {
                    tracing::debug!(%stage, error = %e, "waiting for guest lease");
                    tokio::time::sleep(hypervisor.probe_interval()).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        let waited = self.vm.await_network(&ip, guest.port, remaining).await?;
        tracing::info!(%stage, %ip, waited = %format_elapsed(waited), "guest network is up");

        if let Err(e) = self.vm.restore(domain).await {
            tracing::warn!(%stage, domain, error = %e, "could not restore guest CPU quota");
        }

        let target = self.settings.guest_target(stage, &ip)?;
        let result = self.remote.run(&target, &guest.command, &stage.label()).await;

        if let Err(e) = self.vm.throttle(domain, hypervisor.idle_cpu_share).await {
            tracing::warn!(%stage, domain, error = %e, "could not throttle guest");
        }

        match result? {
            0 => Ok(()),
            code => Err(StageError::Exit { what: format!("{stage} command"), code }),
        }
    }

    async fn checked(&self, spec: &CommandSpec, label: &str, what: &str) -> Result<(), StageError> {
        match self.process.run(spec, label).await? {
            0 => Ok(()),
            code => Err(StageError::Exit { what: what.to_string(), code }),
        }
    }

    /// Run each command, logging and ignoring failures.
    async fn best_effort(&self, commands: &[CommandLine], cwd: Option<&Path>, label: &str) {
        for line in commands {
            let spec = match CommandSpec::from_line(line) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid command");
                    continue;
                }
            };
            let spec = match cwd {
                Some(dir) => spec.cwd(dir),
                None => spec,
            };
            match self.process.run(&spec, label).await {
                Ok(0) => {}
                Ok(code) => tracing::warn!(command = %spec, code, "best-effort command failed"),
                Err(e) => tracing::warn!(command = %spec, error = %e, "best-effort command failed"),
            }
        }
    }

    fn report_artifacts(&self) {
        let build = &self.settings.build;
        artifacts::report(&build.repo_dir.join("target"), &build.artifacts, build.artifact_max_depth);
    }
}

#[async_trait]
impl<P, R, V> StageExecutor for StageRunner<P, R, V>
where
    P: ProcessRunner,
    R: RemoteRunner,
    V: VmController,
{
    async fn dispatch(&self, stage: Stage) -> Result<(), StageError> {
        match stage {
            Stage::Host => {
                let result = self.perform(Stage::Host).await;
                self.report_artifacts();
                result
            }
            Stage::Cloud => {
                let result = self.dispatch_cloud().await;
                self.report_artifacts();
                result
            }
            Stage::GuestWin | Stage::GuestMac => self.dispatch_guest(stage).await,
        }
    }
}

async fn wait_for_dir(dir: &Path, limit: Duration) {
    let deadline = Instant::now() + limit;
    while !dir.is_dir() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{StageError, StageExecutor};
    use crate::orchestrator::{AttemptPhase, PhaseHandle};
    use async_trait::async_trait;
    use lc_core::Stage;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted behavior for one stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeStage {
        Succeed,
        Exit(i32),
        Panic,
        /// Sleep, then succeed
        Delay(Duration),
    }

    #[derive(Default)]
    struct FakeStageState {
        behaviors: HashMap<Stage, FakeStage>,
        calls: Vec<Stage>,
        in_flight: usize,
        max_in_flight: usize,
        phase_probe: Option<PhaseHandle>,
        observed_phases: Vec<AttemptPhase>,
    }

    /// Fake stage executor for testing. Unscripted stages succeed.
    #[derive(Clone, Default)]
    pub struct FakeStageExecutor {
        inner: Arc<Mutex<FakeStageState>>,
    }

    impl FakeStageExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, stage: Stage, behavior: FakeStage) {
            self.inner.lock().behaviors.insert(stage, behavior);
        }

        /// Record the orchestrator phase seen from inside each dispatch.
        pub fn observe(&self, phase: PhaseHandle) {
            self.inner.lock().phase_probe = Some(phase);
        }

        pub fn calls(&self) -> Vec<Stage> {
            self.inner.lock().calls.clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.inner.lock().max_in_flight
        }

        pub fn observed_phases(&self) -> Vec<AttemptPhase> {
            self.inner.lock().observed_phases.clone()
        }
    }

    #[async_trait]
    impl StageExecutor for FakeStageExecutor {
        async fn dispatch(&self, stage: Stage) -> Result<(), StageError> {
            let behavior = {
                let mut state = self.inner.lock();
                state.calls.push(stage);
                state.in_flight += 1;
                state.max_in_flight = state.max_in_flight.max(state.in_flight);
                if let Some(phase) = state.phase_probe.as_ref().map(PhaseHandle::get) {
                    state.observed_phases.push(phase);
                }
                state.behaviors.get(&stage).copied().unwrap_or(FakeStage::Succeed)
            };

            // Give sibling stages a chance to start before any finishes
            tokio::task::yield_now().await;
            let result = match behavior {
                FakeStage::Succeed => Ok(()),
                FakeStage::Exit(code) => Err(StageError::Exit { what: format!("{stage} command"), code }),
                FakeStage::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(())
                }
                #[allow(clippy::panic)]
                FakeStage::Panic => {
                    self.inner.lock().in_flight -= 1;
                    panic!("fake stage {stage} exploded");
                }
            };
            self.inner.lock().in_flight -= 1;
            result
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStage, FakeStageExecutor};

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
