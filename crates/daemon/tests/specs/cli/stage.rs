//! `lcloudd stage` specs

use crate::prelude::*;

#[test]
fn host_with_nothing_to_compile_succeeds() {
    let fleet = Fleet::host_only();

    fleet.lcloudd().args(&["stage", "host"]).passes();
}

#[test]
fn failing_prepare_command_is_best_effort() {
    let fleet = Fleet::new();
    fleet.config(&format!("{HOST_ONLY}prepare = [[\"false\"]]\n"));

    fleet.lcloudd().args(&["stage", "host"]).passes();
}

#[test]
fn compile_failure_exits_one() {
    let fleet = Fleet::new();
    fleet.config(&HOST_ONLY.replace("targets = []", "targets = [\"x86_64-unknown-linux-gnu\"]"));
    fleet.script("rustup", "exit 0");
    fleet.script("cargo", "echo 'error: could not compile' >&2\nexit 101");

    fleet
        .lcloudd_with_scripts()
        .args(&["stage", "host"])
        .exits_with(1)
        .stdout_has("[ host ] error: could not compile")
        .stderr_has("host failed");
}

#[test]
fn unconfigured_role_is_fatal() {
    let fleet = Fleet::host_only();

    fleet.lcloudd().args(&["stage", "guest-win11"]).exits_with(2).stderr_has("[guests]");
}
