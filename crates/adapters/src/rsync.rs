// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rsync invocations that mirror the repository to and from the cloud.
//!
//! The repository lands in `<workdir>/<repo name>` on the cloud, the
//! directory its guests mount, so they build from the same tree.

use std::path::Path;
use std::time::Duration;

use lc_core::RemoteTarget;

use crate::remote::ssh_command;
use crate::subprocess::CommandSpec;

/// Directories never sent to the cloud.
pub const PUSH_EXCLUDES: [&str; 2] = [".git/", "target/"];

/// Copy `repo_dir` (minus `.git/` and `target/`) into the target's workdir.
pub fn push_repo(target: &RemoteTarget, repo_dir: &Path, connect_timeout: Duration) -> CommandSpec {
    let source = repo_dir.to_string_lossy().trim_end_matches('/').to_string();
    let mut spec = base(target, connect_timeout);
    for exclude in PUSH_EXCLUDES {
        spec = spec.arg(format!("--exclude={exclude}"));
    }
    spec.arg(source).arg(format!("{}:{}/", target.destination(), target.workdir.trim_end_matches('/')))
}

/// Copy the cloud's `target/` for this repository back into `repo_dir/target`.
pub fn pull_target(target: &RemoteTarget, repo_dir: &Path, connect_timeout: Duration) -> CommandSpec {
    let name = repo_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let remote = format!("{}:{}/{}/target/.", target.destination(), target.workdir.trim_end_matches('/'), name);
    base(target, connect_timeout)
        .arg("--exclude=.git/")
        .arg(remote)
        .arg(repo_dir.join("target").display().to_string())
}

fn base(target: &RemoteTarget, connect_timeout: Duration) -> CommandSpec {
    let ssh = ssh_command(target, connect_timeout);
    let transport = std::iter::once(ssh.program.as_str())
        .chain(ssh.args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ");
    let mut spec = CommandSpec::new("rsync").args(["-az", "-e"]).arg(transport);
    spec.env = ssh.env;
    spec
}

/// Quote a word for rsync's `-e` splitting when it contains whitespace.
fn quote(word: &str) -> String {
    if word.contains(char::is_whitespace) {
        format!("'{}'", word.replace('\'', "'\\''"))
    } else {
        word.to_string()
    }
}

#[cfg(test)]
#[path = "rsync_tests.rs"]
mod tests;
