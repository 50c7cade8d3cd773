//! Startup configuration failures are fatal (exit 2)

use crate::prelude::*;

#[test]
fn missing_config_is_fatal() {
    let fleet = Fleet::new();

    fleet.lcloudd().args(&["run"]).exits_with(2).stderr_has("failed to read config");
}

#[test]
fn empty_dispatch_is_fatal() {
    let fleet = Fleet::new();
    fleet.config(&HOST_ONLY.replace("dispatch = [\"host\"]", "dispatch = []"));

    fleet.lcloudd().args(&["run"]).exits_with(2).stderr_has("build.dispatch");
}

#[test]
fn unknown_stage_name_is_fatal() {
    let fleet = Fleet::new();
    fleet.config(&HOST_ONLY.replace("dispatch = [\"host\"]", "dispatch = [\"host\", \"beos\"]"));

    fleet.lcloudd().args(&["run"]).exits_with(2).stderr_has("unknown stage");
}

#[test]
fn missing_cloud_key_is_fatal() {
    let fleet = Fleet::new();
    fleet.config(
        r#"
[watch]
url = "http://127.0.0.1:9/commits/master"

[build]
repo_dir = "{repo}"
dispatch = ["cloud"]

[cloud]
host = "127.0.0.1"
user = "user"
key_file = "{root}/no-such-key"
shared_dir = "/mnt/nfs/shared-vm-dir"
command = "lcloudd stage cloud"
"#,
    );

    fleet.lcloudd().args(&["run"]).exits_with(2).stderr_has("credentials file for cloud");
}

#[test]
fn explicit_config_flag_wins_over_environment() {
    let fleet = Fleet::host_only();
    let other = fleet.file("other.toml", "not = [valid");

    fleet
        .lcloudd()
        .args(&["--config", &other.display().to_string(), "stage", "host"])
        .exits_with(2)
        .stderr_has("other.toml");
}
