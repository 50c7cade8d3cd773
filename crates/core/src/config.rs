// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! One TOML file describes the whole fleet. It is parsed and validated
//! once at startup into [`Settings`], which is then passed by reference
//! to the watcher, ledger and orchestrator constructors.
//!
//! ```toml
//! [watch]
//! url = "https://api.github.com/repos/owner/repo/commits/master"
//!
//! [build]
//! repo_dir = "/j/proj/full-crisis"
//! dispatch = ["host", "cloud"]
//!
//! [host]
//! targets = ["x86_64-unknown-linux-gnu"]
//!
//! [cloud]
//! host = "169.254.100.20"
//! user = "user"
//! key_file = "/j/ident/azure_sidekick"
//! shared_dir = "/mnt/nfs/shared-vm-dir"
//! command = "lcloudd stage cloud"
//!
//! [[guests]]
//! stage = "guest-win11"
//! domain = "Builder-Win11"
//! user = "builder"
//! password_env = "LCLOUD_WIN11_PASSWORD"
//! workdir = 'Z:\full-crisis'
//! command = 'lcloudd stage guest-win11'
//! targets = ["x86_64-pc-windows-gnu"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::stage::Stage;
use crate::target::{Credential, RemoteTarget};

/// A program followed by its arguments.
pub type CommandLine = Vec<String>;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("stage '{stage}' is dispatched but has no [{section}] section")]
    MissingSection { stage: Stage, section: &'static str },

    #[error("credentials file for {what} is missing or unreadable: {path}")]
    MissingCredential { what: String, path: PathBuf },

    #[error("environment variable {var} with the password for {what} is not set")]
    MissingPasswordEnv { what: String, var: String },
}

/// Fully parsed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub ledger: LedgerSettings,
    pub watch: WatchSettings,
    pub build: BuildSettings,
    #[serde(default)]
    pub host: Option<HostSettings>,
    #[serde(default)]
    pub cloud: Option<CloudSettings>,
    #[serde(default)]
    pub hypervisor: HypervisorSettings,
    #[serde(default)]
    pub guests: Vec<GuestSettings>,
    #[serde(default)]
    pub publish: Option<PublishSettings>,
}

/// Retry bookkeeping limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LedgerSettings {
    /// Failures after which a commit is skipped until its entry expires.
    pub max_build_failures: u32,
    /// How long an entry survives after its last write.
    pub retention_secs: u64,
}

impl LedgerSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self { max_build_failures: 3, retention_secs: 24 * 60 * 60 }
    }
}

/// Poll interval used while process uptime is below `until_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollTier {
    pub until_secs: u64,
    pub interval_secs: u64,
}

/// Commit polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSettings {
    /// JSON commit-info endpoint; the response must carry a `sha` field.
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<PollTier>,
    /// Interval once uptime has passed every tier.
    #[serde(default = "default_steady_interval_secs")]
    pub steady_interval_secs: u64,
    /// Zero the head commit's failure count on daemon start.
    #[serde(default = "default_true")]
    pub forgive_on_startup: bool,
}

impl WatchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What gets built and which stages the daemon fans out.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    pub repo_dir: PathBuf,
    pub dispatch: Vec<Stage>,
    /// Names searched for under `target/` in the artifact age report.
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<String>,
    /// Binaries deleted before each compile so a stale one cannot pass
    /// for a fresh build.
    #[serde(default = "default_binary_names")]
    pub binary_names: Vec<String>,
    /// Also produce debug builds.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_artifact_depth")]
    pub artifact_max_depth: usize,
}

/// Local compile on the host machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSettings {
    pub targets: Vec<String>,
    /// Exported as `RUSTFLAGS` for the host compile.
    #[serde(default)]
    pub rustflags: Option<String>,
    #[serde(default)]
    pub prepare: Vec<CommandLine>,
}

/// The hypervisor machine, reached from the host with a key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudSettings {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    pub key_file: PathBuf,
    /// Directory on the cloud shared with the guests (NFS export).
    pub shared_dir: String,
    /// Command that performs the cloud role on the cloud machine.
    pub command: String,
    /// Rsync the repository up before and `target/` back after.
    #[serde(default = "default_true")]
    pub sync: bool,
    /// Best-effort commands run on the cloud before the guests start.
    #[serde(default)]
    pub prepare: Vec<CommandLine>,
    /// Best-effort commands run on the cloud after every guest finished.
    #[serde(default)]
    pub finish: Vec<CommandLine>,
}

/// libvirt control and guest readiness.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HypervisorSettings {
    /// Command prefix for virsh, e.g. `["sudo", "virsh"]`.
    pub virsh: CommandLine,
    /// dnsmasq lease status file used to look up guest addresses.
    pub lease_file: PathBuf,
    /// How long to wait for a guest's SSH port after boot.
    pub network_timeout_secs: u64,
    pub probe_interval_ms: u64,
    pub ssh_connect_timeout_secs: u64,
    /// CPU share (percent of one vCPU period) for idle guests.
    pub idle_cpu_share: u8,
    pub cpu_period_us: u64,
}

impl HypervisorSettings {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn ssh_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_connect_timeout_secs)
    }
}

impl Default for HypervisorSettings {
    fn default() -> Self {
        Self {
            virsh: vec!["sudo".to_string(), "virsh".to_string()],
            lease_file: PathBuf::from("/var/lib/libvirt/dnsmasq/virbr0.status"),
            network_timeout_secs: 14,
            probe_interval_ms: 500,
            ssh_connect_timeout_secs: 10,
            idle_cpu_share: 10,
            cpu_period_us: 100_000,
        }
    }
}

/// One guest VM.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestSettings {
    pub stage: Stage,
    /// libvirt domain name; also the DHCP hostname.
    pub domain: String,
    /// Static address; when absent the lease file is consulted.
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default)]
    pub password_env: Option<String>,
    /// Repository checkout as seen from inside the guest.
    pub workdir: String,
    /// Command that performs this guest role inside the guest.
    pub command: String,
    #[serde(default)]
    pub targets: Vec<String>,
    /// Best-effort commands run inside the guest before compiling.
    #[serde(default)]
    pub prepare: Vec<CommandLine>,
}

/// Downstream publish step, run once after a fully successful attempt.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSettings {
    pub command: CommandLine,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl Settings {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Parse and validate config text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.url.trim().is_empty() {
            return Err(ConfigError::Invalid("watch.url must not be empty".into()));
        }
        if self.ledger.max_build_failures == 0 {
            return Err(ConfigError::Invalid("ledger.max_build_failures must be at least 1".into()));
        }
        if self.watch.steady_interval_secs == 0 {
            return Err(ConfigError::Invalid("watch.steady_interval_secs must be positive".into()));
        }
        let mut previous = 0;
        for tier in &self.watch.tiers {
            if tier.interval_secs == 0 {
                return Err(ConfigError::Invalid("watch.tiers intervals must be positive".into()));
            }
            if tier.until_secs <= previous {
                return Err(ConfigError::Invalid(
                    "watch.tiers must be sorted by strictly increasing until_secs".into(),
                ));
            }
            previous = tier.until_secs;
        }
        if !(1..=100).contains(&self.hypervisor.idle_cpu_share) {
            return Err(ConfigError::Invalid("hypervisor.idle_cpu_share must be 1..=100".into()));
        }
        if self.hypervisor.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid("hypervisor.probe_interval_ms must be positive".into()));
        }
        if self.hypervisor.virsh.is_empty() {
            return Err(ConfigError::Invalid("hypervisor.virsh must name a program".into()));
        }
        if self.build.dispatch.is_empty() {
            return Err(ConfigError::Invalid("build.dispatch must list at least one stage".into()));
        }

        let mut seen = HashSet::new();
        for guest in &self.guests {
            if !guest.stage.is_guest() {
                return Err(ConfigError::Invalid(format!(
                    "[[guests]] entry for '{}' must use a guest stage",
                    guest.domain
                )));
            }
            if !seen.insert(guest.stage) {
                return Err(ConfigError::Invalid(format!(
                    "stage '{}' is configured by more than one [[guests]] entry",
                    guest.stage
                )));
            }
            if guest.password_file.is_none() && guest.password_env.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "guest '{}' needs password_file or password_env",
                    guest.stage
                )));
            }
        }

        for stage in &self.build.dispatch {
            match stage {
                Stage::Host if self.host.is_none() => {
                    return Err(ConfigError::MissingSection { stage: *stage, section: "host" })
                }
                Stage::Cloud if self.cloud.is_none() => {
                    return Err(ConfigError::MissingSection { stage: *stage, section: "cloud" })
                }
                Stage::GuestWin | Stage::GuestMac if self.guest(*stage).is_none() => {
                    return Err(ConfigError::MissingSection { stage: *stage, section: "guests" })
                }
                _ => {}
            }
        }

        if let Some(publish) = &self.publish {
            if publish.command.is_empty() {
                return Err(ConfigError::Invalid("publish.command must name a program".into()));
            }
        }
        Ok(())
    }

    pub fn guest(&self, stage: Stage) -> Option<&GuestSettings> {
        self.guests.iter().find(|g| g.stage == stage)
    }

    /// Key-authenticated target for the cloud machine.
    pub fn cloud_target(&self) -> Result<RemoteTarget, ConfigError> {
        let cloud = self
            .cloud
            .as_ref()
            .ok_or(ConfigError::MissingSection { stage: Stage::Cloud, section: "cloud" })?;
        if !cloud.key_file.is_file() {
            return Err(ConfigError::MissingCredential {
                what: "cloud".to_string(),
                path: cloud.key_file.clone(),
            });
        }
        Ok(RemoteTarget::new(&cloud.host, &cloud.user, Credential::KeyFile(cloud.key_file.clone()))
            .with_port(cloud.port)
            .with_workdir(&cloud.shared_dir))
    }

    /// Password credential for a guest, read from its file or env var.
    pub fn guest_credential(&self, stage: Stage) -> Result<Credential, ConfigError> {
        let guest = self
            .guest(stage)
            .ok_or(ConfigError::MissingSection { stage, section: "guests" })?;
        if let Some(path) = &guest.password_file {
            let raw = std::fs::read_to_string(path).map_err(|_| {
                ConfigError::MissingCredential { what: stage.to_string(), path: path.clone() }
            })?;
            return Ok(Credential::Password(raw.trim_end_matches(['\r', '\n']).to_string()));
        }
        match &guest.password_env {
            Some(var) => std::env::var(var).map(Credential::Password).map_err(|_| {
                ConfigError::MissingPasswordEnv { what: stage.to_string(), var: var.clone() }
            }),
            None => Err(ConfigError::Invalid(format!(
                "guest '{}' needs password_file or password_env",
                stage
            ))),
        }
    }

    /// Password-authenticated target for a guest at a resolved address.
    pub fn guest_target(&self, stage: Stage, ip: &str) -> Result<RemoteTarget, ConfigError> {
        let credential = self.guest_credential(stage)?;
        let guest = self
            .guest(stage)
            .ok_or(ConfigError::MissingSection { stage, section: "guests" })?;
        Ok(RemoteTarget::new(ip, &guest.user, credential)
            .with_port(guest.port)
            .with_workdir(&guest.workdir))
    }

    /// Resolve every credential the daemon needs to dispatch its stages.
    pub fn preflight_dispatch(&self) -> Result<(), ConfigError> {
        for stage in &self.build.dispatch {
            self.preflight_dispatch_stage(*stage)?;
        }
        Ok(())
    }

    /// Resolve every credential needed to perform `stage` locally.
    pub fn preflight_perform(&self, stage: Stage) -> Result<(), ConfigError> {
        match stage {
            Stage::Host if self.host.is_none() => {
                Err(ConfigError::MissingSection { stage, section: "host" })
            }
            Stage::Cloud => {
                for guest in &self.guests {
                    self.guest_credential(guest.stage)?;
                }
                Ok(())
            }
            Stage::GuestWin | Stage::GuestMac if self.guest(stage).is_none() => {
                Err(ConfigError::MissingSection { stage, section: "guests" })
            }
            _ => Ok(()),
        }
    }

    fn preflight_dispatch_stage(&self, stage: Stage) -> Result<(), ConfigError> {
        match stage {
            Stage::Host => Ok(()),
            Stage::Cloud => self.cloud_target().map(|_| ()),
            Stage::GuestWin | Stage::GuestMac => self.guest_credential(stage).map(|_| ()),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    RemoteTarget::DEFAULT_PORT
}

fn default_user_agent() -> String {
    concat!("lcloud/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_tiers() -> Vec<PollTier> {
    vec![PollTier { until_secs: 60, interval_secs: 5 }, PollTier { until_secs: 120, interval_secs: 15 }]
}

fn default_steady_interval_secs() -> u64 {
    60
}

fn default_artifacts() -> Vec<String> {
    ["full-crisis", "full-crisis.exe", "Full-Crisis.app"].map(String::from).to_vec()
}

fn default_binary_names() -> Vec<String> {
    ["full-crisis", "full-crisis.exe"].map(String::from).to_vec()
}

fn default_artifact_depth() -> usize {
    12
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
