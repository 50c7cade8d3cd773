// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

struct EnvGuard(Vec<(&'static str, Option<String>)>);

impl EnvGuard {
    fn set(vars: &[(&'static str, Option<&str>)]) -> Self {
        let saved = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (k, v) in vars {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
        Self(saved)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, v) in &self.0 {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
    }
}

#[test]
#[serial]
fn explicit_config_wins() {
    let _env = EnvGuard::set(&[("LCLOUD_CONFIG", Some("/etc/lcloud.toml")), ("XDG_CONFIG_HOME", Some("/xdg"))]);

    assert_eq!(config_path().unwrap(), PathBuf::from("/etc/lcloud.toml"));
}

#[test]
#[serial]
fn config_falls_back_to_xdg() {
    let _env = EnvGuard::set(&[("LCLOUD_CONFIG", Some("")), ("XDG_CONFIG_HOME", Some("/xdg"))]);

    assert_eq!(config_path().unwrap(), PathBuf::from("/xdg/lcloud/lcloud.toml"));
}

#[test]
#[serial]
fn config_falls_back_to_home() {
    let _env = EnvGuard::set(&[("LCLOUD_CONFIG", None), ("XDG_CONFIG_HOME", None), ("HOME", Some("/home/builder"))]);

    assert_eq!(config_path().unwrap(), PathBuf::from("/home/builder/.config/lcloud/lcloud.toml"));
}

#[test]
#[serial]
fn explicit_state_dir_wins() {
    let _env = EnvGuard::set(&[("LCLOUD_STATE_DIR", Some("/var/lib/lcloud")), ("XDG_STATE_HOME", Some("/xdg"))]);

    assert_eq!(state_dir().unwrap(), PathBuf::from("/var/lib/lcloud"));
}

#[test]
#[serial]
fn state_dir_falls_back_to_xdg_then_home() {
    let _env = EnvGuard::set(&[("LCLOUD_STATE_DIR", None), ("XDG_STATE_HOME", Some("/xdg"))]);
    assert_eq!(state_dir().unwrap(), PathBuf::from("/xdg/lcloud"));

    let _env = EnvGuard::set(&[("XDG_STATE_HOME", None), ("HOME", Some("/home/builder"))]);
    assert_eq!(state_dir().unwrap(), PathBuf::from("/home/builder/.local/state/lcloud"));
}
