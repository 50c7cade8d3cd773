// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd install` - register the daemon as a systemd service

use std::path::{Path, PathBuf};

use lc_adapters::{CommandSpec, ConsoleSink, LocalProcessRunner, ProcessRunner};

use crate::lifecycle::Paths;
use crate::ExitError;

pub const UNIT_NAME: &str = "lcloudd.service";
pub const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

/// What the generated unit runs, and as whom.
#[derive(Debug, Clone)]
pub struct UnitOptions {
    pub exe: PathBuf,
    pub config: PathBuf,
    pub state_dir: PathBuf,
    pub user: Option<String>,
}

/// The unit restarts the daemon one second after any exit, with no
/// start-rate limit, and sends its output to the journal.
pub fn unit_text(opts: &UnitOptions) -> String {
    let user = opts.user.as_ref().map(|u| format!("User={u}\n")).unwrap_or_default();
    format!(
        "[Unit]\n\
         Description=lcloud cross-platform build daemon\n\
         After=network-online.target\n\
         Wants=network-online.target\n\
         StartLimitIntervalSec=0\n\
         \n\
         [Service]\n\
         Type=simple\n\
         Restart=always\n\
         RestartSec=1\n\
         {user}\
         Environment={state_env}\n\
         ExecStart={exe} --config {config} run\n\
         StandardOutput=journal\n\
         StandardError=journal\n\
         StandardInput=null\n\
         TimeoutStopSec=4\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        state_env = quote(&format!("LCLOUD_STATE_DIR={}", opts.state_dir.display())),
        exe = quote(&opts.exe.display().to_string()),
        config = quote(&opts.config.display().to_string()),
    )
}

/// Quote one word for a unit file, escaping `\`, `"` and `%` specifiers.
fn quote(word: &str) -> String {
    let escaped = word.replace('\\', "\\\\").replace('"', "\\\"").replace('%', "%%");
    format!("\"{escaped}\"")
}

/// Write the unit into `unit_dir` and, with `enable`, start it now and
/// on every boot.
pub async fn install(
    config: &Path,
    paths: &Paths,
    unit_dir: Option<PathBuf>,
    user: Option<String>,
    enable: bool,
) -> Result<(), ExitError> {
    let exe = std::env::current_exe().map_err(|e| ExitError::fatal(format!("cannot locate lcloudd: {e}")))?;
    let config = std::path::absolute(config).map_err(ExitError::fatal)?;
    let opts = UnitOptions { exe, config, state_dir: paths.state_dir.clone(), user };

    let unit_dir = unit_dir.unwrap_or_else(|| PathBuf::from(SYSTEM_UNIT_DIR));
    let unit_path = write_unit(&unit_dir, &opts)?;
    println!("wrote {}", unit_path.display());

    if enable {
        let systemctl = LocalProcessRunner::new(ConsoleSink::shared());
        systemctl_run(&systemctl, &["daemon-reload"]).await?;
        systemctl_run(&systemctl, &["enable", "--now", UNIT_NAME]).await?;
        println!("enabled and started {UNIT_NAME}");
    }
    Ok(())
}

pub fn write_unit(unit_dir: &Path, opts: &UnitOptions) -> Result<PathBuf, ExitError> {
    std::fs::create_dir_all(unit_dir)
        .map_err(|e| ExitError::fatal(format!("cannot create {}: {e}", unit_dir.display())))?;
    let path = unit_dir.join(UNIT_NAME);
    std::fs::write(&path, unit_text(opts))
        .map_err(|e| ExitError::fatal(format!("cannot write {}: {e}", path.display())))?;
    Ok(path)
}

async fn systemctl_run<P: ProcessRunner>(process: &P, args: &[&str]) -> Result<(), ExitError> {
    let spec = CommandSpec::new("systemctl").args(args.iter().copied());
    match process.run(&spec, "[ systemctl ] ").await {
        Ok(0) => Ok(()),
        Ok(code) => Err(ExitError::failed(format!("`{spec}` exited with code {code}"))),
        Err(e) => Err(ExitError::fatal(e)),
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
