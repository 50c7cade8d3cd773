// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guest VM lifecycle on the libvirt hypervisor.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use lc_core::{CommandLine, HypervisorSettings};
use serde::Deserialize;
use thiserror::Error;

use crate::net;
use crate::subprocess::{CommandSpec, ProcessError, ProcessRunner};

/// Errors from VM lifecycle operations
#[derive(Debug, Error)]
pub enum VmError {
    #[error("virsh {action} {domain} failed: {detail}")]
    Command { action: &'static str, domain: String, detail: String },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("failed to read lease file {path}: {source}")]
    LeaseRead { path: PathBuf, source: std::io::Error },
    #[error("lease file {path} is not valid JSON: {source}")]
    LeaseParse { path: PathBuf, source: serde_json::Error },
    #[error("no DHCP lease for '{domain}' in {path}")]
    NoLease { domain: String, path: PathBuf },
    #[error("{host}:{port} did not accept connections within {timeout:?}: {source}")]
    NetworkTimeout { host: String, port: u16, timeout: Duration, source: std::io::Error },
}

/// Controls guest VMs on the hypervisor.
///
/// Lifecycle calls may fail; callers decide whether that matters.
/// `await_network` is the one that gates a guest's build.
#[async_trait]
pub trait VmController: Clone + Send + Sync + 'static {
    /// Boot `domain` unless it is already running.
    async fn ensure_running(&self, domain: &str) -> Result<(), VmError>;

    /// Address of `domain`: `static_ip` when given, else its DHCP lease.
    async fn resolve_ip(&self, domain: &str, static_ip: Option<&str>) -> Result<String, VmError>;

    /// Wait for `host:port` to accept TCP connections. Fails only after
    /// `timeout` has fully elapsed.
    async fn await_network(&self, host: &str, port: u16, timeout: Duration) -> Result<Duration, VmError>;

    /// Cap `domain` at `cpu_share` percent of each vCPU period.
    async fn throttle(&self, domain: &str, cpu_share: u8) -> Result<(), VmError>;

    /// Remove any CPU cap from `domain`.
    async fn restore(&self, domain: &str) -> Result<(), VmError>;
}

/// [`VmController`] driving the `virsh` command line.
#[derive(Clone)]
pub struct VirshController<P: ProcessRunner> {
    process: P,
    virsh: CommandLine,
    lease_file: PathBuf,
    cpu_period_us: u64,
    probe_interval: Duration,
}

impl<P: ProcessRunner> VirshController<P> {
    pub fn new(process: P, settings: &HypervisorSettings) -> Self {
        Self {
            process,
            virsh: settings.virsh.clone(),
            lease_file: settings.lease_file.clone(),
            cpu_period_us: settings.cpu_period_us,
            probe_interval: settings.probe_interval(),
        }
    }

    fn virsh<I, S>(&self, args: I) -> Result<CommandSpec, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(CommandSpec::from_line(&self.virsh)?.args(args))
    }

    async fn checked(&self, action: &'static str, domain: &str, spec: CommandSpec) -> Result<String, VmError> {
        let output = self.process.capture(&spec).await?;
        if !output.success() {
            let detail = match output.stderr.trim() {
                "" => format!("exit code {}", output.code),
                stderr => stderr.to_string(),
            };
            return Err(VmError::Command { action, domain: domain.to_string(), detail });
        }
        Ok(output.stdout)
    }

    async fn set_quota(&self, domain: &str, quota: i64) -> Result<(), VmError> {
        let quota = format!("vcpu_quota={quota}");
        let spec = self.virsh(["schedinfo", domain, "--live", "--set", quota.as_str()])?;
        self.checked("schedinfo", domain, spec).await.map(|_| ())
    }
}

#[async_trait]
impl<P: ProcessRunner> VmController for VirshController<P> {
    async fn ensure_running(&self, domain: &str) -> Result<(), VmError> {
        let state = self.checked("domstate", domain, self.virsh(["domstate", domain])?).await?;
        if state.trim() == "running" {
            tracing::debug!(domain, "guest already running");
            return Ok(());
        }
        tracing::info!(domain, state = state.trim(), "starting guest");
        self.checked("start", domain, self.virsh(["start", domain])?).await.map(|_| ())
    }

    async fn resolve_ip(&self, domain: &str, static_ip: Option<&str>) -> Result<String, VmError> {
        if let Some(ip) = static_ip {
            return Ok(ip.to_string());
        }
        let text = tokio::fs::read_to_string(&self.lease_file)
            .await
            .map_err(|source| VmError::LeaseRead { path: self.lease_file.clone(), source })?;
        lease_ip(&text, domain)
            .map_err(|source| VmError::LeaseParse { path: self.lease_file.clone(), source })?
            .ok_or_else(|| VmError::NoLease { domain: domain.to_string(), path: self.lease_file.clone() })
    }

    async fn await_network(&self, host: &str, port: u16, timeout: Duration) -> Result<Duration, VmError> {
        net::await_port(host, port, timeout, self.probe_interval).await.map_err(|source| {
            VmError::NetworkTimeout { host: host.to_string(), port, timeout, source }
        })
    }

    async fn throttle(&self, domain: &str, cpu_share: u8) -> Result<(), VmError> {
        self.set_quota(domain, quota_for(self.cpu_period_us, cpu_share)).await
    }

    async fn restore(&self, domain: &str) -> Result<(), VmError> {
        self.set_quota(domain, -1).await
    }
}

/// vCPU quota in microseconds for `share` percent of `period_us`.
pub fn quota_for(period_us: u64, share: u8) -> i64 {
    let share = u64::from(share.clamp(1, 100));
    // libvirt rejects quotas below 1ms
    (period_us * share / 100).max(1000) as i64
}

#[derive(Debug, Deserialize)]
struct Lease {
    #[serde(default)]
    hostname: Option<String>,
    #[serde(rename = "ip-address")]
    ip_address: String,
}

/// Look up `domain` in a dnsmasq lease status file (a JSON array of
/// objects with `hostname` and `ip-address`). Hostnames compare
/// case-insensitively; the last matching lease wins.
pub fn lease_ip(text: &str, domain: &str) -> Result<Option<String>, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let leases: Vec<Lease> = serde_json::from_str(text)?;
    Ok(leases
        .into_iter()
        .filter(|l| l.hostname.as_deref().is_some_and(|h| h.eq_ignore_ascii_case(domain)))
        .map(|l| l.ip_address)
        .last())
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{VmController, VmError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    /// Recorded VM operation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum VmCall {
        EnsureRunning(String),
        ResolveIp(String),
        AwaitNetwork { host: String, port: u16 },
        Throttle { domain: String, cpu_share: u8 },
        Restore(String),
    }

    #[derive(Default)]
    struct FakeVmState {
        leases: HashMap<String, String>,
        dead_hosts: HashSet<String>,
        lifecycle_fails: bool,
        calls: Vec<VmCall>,
    }

    /// Fake VM controller for testing.
    ///
    /// Every host's network is up unless marked dead; lifecycle calls
    /// succeed unless `fail_lifecycle` is set.
    #[derive(Clone, Default)]
    pub struct FakeVmController {
        inner: Arc<Mutex<FakeVmState>>,
    }

    impl FakeVmController {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_lease(&self, domain: &str, ip: &str) {
            self.inner.lock().leases.insert(domain.to_string(), ip.to_string());
        }

        /// `await_network` against `host` times out.
        pub fn network_down(&self, host: &str) {
            self.inner.lock().dead_hosts.insert(host.to_string());
        }

        /// `ensure_running`, `throttle` and `restore` all fail.
        pub fn fail_lifecycle(&self) {
            self.inner.lock().lifecycle_fails = true;
        }

        pub fn calls(&self) -> Vec<VmCall> {
            self.inner.lock().calls.clone()
        }

        fn lifecycle(&self, call: VmCall, action: &'static str, domain: &str) -> Result<(), VmError> {
            let mut state = self.inner.lock();
            state.calls.push(call);
            if state.lifecycle_fails {
                return Err(VmError::Command { action, domain: domain.to_string(), detail: "fake".into() });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VmController for FakeVmController {
        async fn ensure_running(&self, domain: &str) -> Result<(), VmError> {
            self.lifecycle(VmCall::EnsureRunning(domain.to_string()), "start", domain)
        }

        async fn resolve_ip(&self, domain: &str, static_ip: Option<&str>) -> Result<String, VmError> {
            let mut state = self.inner.lock();
            state.calls.push(VmCall::ResolveIp(domain.to_string()));
            if let Some(ip) = static_ip {
                return Ok(ip.to_string());
            }
            state.leases.get(domain).cloned().ok_or_else(|| VmError::NoLease {
                domain: domain.to_string(),
                path: PathBuf::from("fake-leases"),
            })
        }

        async fn await_network(&self, host: &str, port: u16, timeout: Duration) -> Result<Duration, VmError> {
            let mut state = self.inner.lock();
            state.calls.push(VmCall::AwaitNetwork { host: host.to_string(), port });
            if state.dead_hosts.contains(host) {
                return Err(VmError::NetworkTimeout {
                    host: host.to_string(),
                    port,
                    timeout,
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "fake"),
                });
            }
            Ok(Duration::ZERO)
        }

        async fn throttle(&self, domain: &str, cpu_share: u8) -> Result<(), VmError> {
            self.lifecycle(VmCall::Throttle { domain: domain.to_string(), cpu_share }, "schedinfo", domain)
        }

        async fn restore(&self, domain: &str) -> Result<(), VmError> {
            self.lifecycle(VmCall::Restore(domain.to_string()), "schedinfo", domain)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeVmController, VmCall};

#[cfg(test)]
#[path = "hypervisor_tests.rs"]
mod tests;
