// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local cargo builds for a set of target triples.

use std::path::{Path, PathBuf};

use lc_adapters::{CommandSpec, ProcessRunner};
use lc_core::{BuildSettings, GuestSettings, HostSettings};

use crate::error::StageError;

/// Cargo build profiles whose output directories may hold stale binaries.
const PROFILES: [&str; 2] = ["release", "debug"];

/// Everything needed to compile one checkout for its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilePlan {
    pub workdir: PathBuf,
    pub targets: Vec<String>,
    pub rustflags: Option<String>,
    pub debug: bool,
    pub binary_names: Vec<String>,
}

impl CompilePlan {
    pub fn for_host(build: &BuildSettings, host: &HostSettings) -> Self {
        Self {
            workdir: build.repo_dir.clone(),
            targets: host.targets.clone(),
            rustflags: host.rustflags.clone(),
            debug: build.debug,
            binary_names: build.binary_names.clone(),
        }
    }

    /// Guests build in their own view of the shared checkout and keep
    /// whatever `RUSTFLAGS` their environment has.
    pub fn for_guest(build: &BuildSettings, guest: &GuestSettings) -> Self {
        Self {
            workdir: PathBuf::from(&guest.workdir),
            targets: guest.targets.clone(),
            rustflags: None,
            debug: build.debug,
            binary_names: build.binary_names.clone(),
        }
    }

    /// Binaries a previous build may have left for `target`.
    pub fn stale_binaries(&self, target: &str) -> Vec<PathBuf> {
        let dir = self.workdir.join("target").join(target);
        PROFILES
            .iter()
            .flat_map(|profile| {
                let dir = dir.join(profile);
                self.binary_names.iter().map(move |name| dir.join(name))
            })
            .collect()
    }

    /// `rustup target add` for `target`.
    pub fn rustup(&self, target: &str) -> CommandSpec {
        self.cargo_env(CommandSpec::new("rustup").args(["target", "add", target]))
    }

    /// `cargo build` for `target`, release or debug.
    pub fn cargo_build(&self, target: &str, release: bool) -> CommandSpec {
        let mut spec = CommandSpec::new("cargo").arg("build");
        if release {
            spec = spec.arg("--release");
        }
        self.cargo_env(spec.arg(format!("--target={target}")))
    }

    fn cargo_env(&self, spec: CommandSpec) -> CommandSpec {
        let spec = spec.cwd(&self.workdir);
        match &self.rustflags {
            Some(flags) => spec.env("RUSTFLAGS", flags.as_str()),
            None => spec,
        }
    }
}

/// Compile every target in `plan`, stopping at the first failed build.
///
/// Stale binaries are deleted first so a failed build cannot leave an old
/// artifact that looks fresh. `rustup target add` is best effort: the
/// toolchain may be managed some other way.
pub async fn compile<P: ProcessRunner>(process: &P, plan: &CompilePlan, label: &str) -> Result<(), StageError> {
    if plan.targets.is_empty() {
        tracing::warn!(workdir = %plan.workdir.display(), "no compile targets configured");
    }
    for target in &plan.targets {
        for stale in plan.stale_binaries(target) {
            remove_stale(&stale);
        }

        match process.run(&plan.rustup(target), label).await {
            Ok(0) => {}
            Ok(code) => tracing::warn!(target = %target, code, "rustup target add failed, continuing"),
            Err(e) => tracing::warn!(target = %target, error = %e, "rustup unavailable, continuing"),
        }

        if plan.debug {
            build(process, plan, target, false, label).await?;
        }
        build(process, plan, target, true, label).await?;
    }
    Ok(())
}

async fn build<P: ProcessRunner>(
    process: &P,
    plan: &CompilePlan,
    target: &str,
    release: bool,
    label: &str,
) -> Result<(), StageError> {
    let spec = plan.cargo_build(target, release);
    tracing::info!(command = %spec, workdir = %plan.workdir.display(), "compiling");
    match process.run(&spec, label).await? {
        0 => Ok(()),
        code => Err(StageError::Compile { target: target.to_string(), release, code }),
    }
}

fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "deleted stale binary"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not delete stale binary"),
    }
}

#[cfg(test)]
#[path = "compile_tests.rs"]
mod tests;
