//! Shared helpers for CLI specs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;

use tempfile::TempDir;

/// Config that needs no credentials and builds nothing.
pub const HOST_ONLY: &str = r#"
[watch]
url = "http://127.0.0.1:9/commits/master"

[build]
repo_dir = "{repo}"
dispatch = ["host"]

[host]
targets = []
"#;

/// `lcloudd` with a clean environment.
pub fn cli() -> Cmd {
    let mut cmd = assert_cmd::Command::cargo_bin("lcloudd").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("LCLOUD_CONFIG")
        .env_remove("LCLOUD_STATE_DIR")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_STATE_HOME");
    Cmd { cmd }
}

pub struct Cmd {
    cmd: assert_cmd::Command,
}

impl Cmd {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> Run {
        let run = Run { output: self.cmd.output().unwrap() };
        assert!(run.output.status.success(), "expected success\n{}", run.describe());
        run
    }

    pub fn exits_with(mut self, code: i32) -> Run {
        let run = Run { output: self.cmd.output().unwrap() };
        assert_eq!(run.output.status.code(), Some(code), "unexpected exit code\n{}", run.describe());
        run
    }
}

pub struct Run {
    output: Output,
}

impl Run {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout().contains(needle), "stdout lacks {needle:?}\n{}", self.describe());
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr().contains(needle), "stderr lacks {needle:?}\n{}", self.describe());
        self
    }

    fn describe(&self) -> String {
        format!("status: {}\nstdout:\n{}\nstderr:\n{}", self.output.status, self.stdout(), self.stderr())
    }
}

/// A scratch machine: config file, state dir and a repository checkout.
pub struct Fleet {
    dir: TempDir,
}

impl Fleet {
    pub fn new() -> Self {
        let fleet = Self { dir: tempfile::tempdir().unwrap() };
        std::fs::create_dir_all(fleet.repo()).unwrap();
        fleet
    }

    /// A fleet whose config is [`HOST_ONLY`].
    pub fn host_only() -> Self {
        let fleet = Self::new();
        fleet.config(HOST_ONLY);
        fleet
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn repo(&self) -> PathBuf {
        self.dir.path().join("full-crisis")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("lcloud.toml")
    }

    /// Write the config; `{repo}` and `{root}` are substituted.
    pub fn config(&self, text: &str) {
        let text = text
            .replace("{repo}", &self.repo().display().to_string())
            .replace("{root}", &self.path().display().to_string());
        std::fs::write(self.config_path(), text).unwrap();
    }

    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Put an executable script named `name` in `bin/`.
    pub fn script(&self, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = self.file(&format!("bin/{name}"), &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// `lcloudd` pointed at this fleet's config and state.
    pub fn lcloudd(&self) -> Cmd {
        cli().env("LCLOUD_CONFIG", self.config_path()).env("LCLOUD_STATE_DIR", self.state_dir())
    }

    /// Like [`Fleet::lcloudd`], with `bin/` first on `PATH`.
    pub fn lcloudd_with_scripts(&self) -> Cmd {
        let path = std::env::var("PATH").unwrap_or_default();
        self.lcloudd().env("PATH", format!("{}:{path}", self.dir.path().join("bin").display()))
    }
}
