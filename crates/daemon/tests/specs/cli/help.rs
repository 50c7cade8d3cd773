//! CLI help output specs

use crate::prelude::*;

#[test]
fn help_lists_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("run")
        .stdout_has("stage")
        .stdout_has("build")
        .stdout_has("ledger")
        .stdout_has("install");
}

#[test]
fn ledger_help_shows_subcommands() {
    cli().args(&["ledger", "--help"]).passes().stdout_has("show").stdout_has("reset");
}

#[test]
fn version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.2");
}

#[test]
fn unknown_stage_is_a_usage_error() {
    cli().args(&["stage", "guest-beos"]).exits_with(2).stderr_has("unknown stage");
}
