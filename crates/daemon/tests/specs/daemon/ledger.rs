//! `lcloudd ledger` specs

use crate::prelude::*;

#[test]
fn show_on_fresh_state_is_empty() {
    let fleet = Fleet::host_only();

    fleet.lcloudd().args(&["ledger", "show"]).passes().stdout_has("ledger is empty");
}

#[test]
fn show_one_unknown_commit() {
    let fleet = Fleet::host_only();

    fleet.lcloudd().args(&["ledger", "show", "ABC123"]).passes().stdout_has("abc123: no record");
}

#[test]
fn show_reads_existing_ledger() {
    let fleet = Fleet::host_only();
    fleet.file(
        "state/ledger.json",
        r#"{"v":1,"saved_at":"2026-01-01T00:00:00Z","entries":{"abc123":{"failure_count":2,"succeeded":false,"expires_at_ms":18446744073709551615}}}"#,
    );

    fleet.lcloudd().args(&["ledger", "show"]).passes().stdout_has("abc123  failures=2  succeeded=false");
}

#[test]
fn reset_forgives_failures() {
    let fleet = Fleet::host_only();
    fleet.file(
        "state/ledger.json",
        r#"{"v":1,"saved_at":"2026-01-01T00:00:00Z","entries":{"abc123":{"failure_count":3,"succeeded":false,"expires_at_ms":18446744073709551615}}}"#,
    );

    fleet.lcloudd().args(&["ledger", "reset", "abc123"]).passes().stdout_has("abc123: failures 3 -> 0");
    fleet.lcloudd().args(&["ledger", "show", "abc123"]).passes().stdout_has("failures=0");
}

#[test]
fn newer_ledger_schema_is_fatal() {
    let fleet = Fleet::host_only();
    fleet.file("state/ledger.json", r#"{"v":99,"saved_at":"2026-01-01T00:00:00Z","entries":{}}"#);

    fleet.lcloudd().args(&["ledger", "show"]).exits_with(2).stderr_has("schema v99");
}
