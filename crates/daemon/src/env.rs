// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Version string reported by `--version` and the startup log line
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

/// Resolve config file: LCLOUD_CONFIG > XDG_CONFIG_HOME/lcloud/lcloud.toml > ~/.config/lcloud/lcloud.toml
pub fn config_path() -> Result<PathBuf, LifecycleError> {
    if let Some(path) = non_empty("LCLOUD_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("lcloud").join("lcloud.toml"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoHome)?;
    Ok(home.join(".config/lcloud/lcloud.toml"))
}

/// Resolve state directory: LCLOUD_STATE_DIR > XDG_STATE_HOME/lcloud > ~/.local/state/lcloud
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("LCLOUD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("lcloud"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoHome)?;
    Ok(home.join(".local/state/lcloud"))
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
