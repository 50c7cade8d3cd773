// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn commit(raw: &str) -> CommitId {
    CommitId::parse(raw).unwrap()
}

fn entries() -> BTreeMap<CommitId, BuildAttemptRecord> {
    BTreeMap::from([
        (commit("aaa111"), BuildAttemptRecord { failure_count: 2, succeeded: false, expires_at_ms: 0 }),
        (
            commit("bbb222"),
            BuildAttemptRecord { failure_count: 0, succeeded: true, expires_at_ms: 1_767_225_600_000 },
        ),
    ])
}

#[test]
fn renders_every_entry() {
    let text = render(&entries(), None);

    assert_eq!(
        text,
        "aaa111  failures=2  succeeded=false  expires=1970-01-01 00:00:00 UTC\n\
         bbb222  failures=0  succeeded=true  expires=2026-01-01 00:00:00 UTC\n"
    );
}

#[test]
fn renders_one_entry() {
    let text = render(&entries(), Some(&commit("BBB222")));

    assert!(text.starts_with("bbb222  failures=0  succeeded=true"));
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn unknown_commit_has_no_record() {
    assert_eq!(render(&entries(), Some(&commit("ccc"))), "ccc: no record\n");
}

#[test]
fn empty_ledger_says_so() {
    assert_eq!(render(&BTreeMap::new(), None), "ledger is empty\n");
}

#[test]
fn reset_is_refused_while_locked() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let config = dir.path().join("lcloud.toml");
    std::fs::write(
        &config,
        "[watch]\nurl = \"http://127.0.0.1:9/\"\n[build]\nrepo_dir = \"/src\"\ndispatch = [\"host\"]\n[host]\ntargets = []\n",
    )
    .unwrap();
    let _held = DaemonLock::acquire(&paths.lock_path).unwrap();

    let err = reset(&config, &paths, "abc").unwrap_err();

    assert_eq!(err.code, ExitError::FATAL);
    assert!(err.message.contains("stop it before editing the ledger"));
    assert!(!paths.ledger_path.exists());
}

#[test]
fn reset_forgives_failures() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let config = dir.path().join("lcloud.toml");
    std::fs::write(
        &config,
        "[watch]\nurl = \"http://127.0.0.1:9/\"\n[build]\nrepo_dir = \"/src\"\ndispatch = [\"host\"]\n[host]\ntargets = []\n",
    )
    .unwrap();
    {
        let mut ledger = Ledger::open(&paths.ledger_path, std::time::Duration::from_secs(3600), SystemClock).unwrap();
        ledger.record_failure(&commit("abc")).unwrap();
    }

    reset(&config, &paths, "abc").unwrap();

    let entries = lc_storage::inspect(&paths.ledger_path, &SystemClock).unwrap();
    assert_eq!(entries[&commit("abc")].failure_count, 0);
}
