// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::subprocess::{CapturedOutput, FakeProcessRunner};
use yare::parameterized;

const LEASES: &str = r#"[
  {
    "ip-address": "192.168.122.40",
    "mac-address": "52:54:00:aa:bb:01",
    "hostname": "Builder-Win11",
    "expiry-time": 1760000000
  },
  {
    "ip-address": "192.168.122.41",
    "mac-address": "52:54:00:aa:bb:02",
    "expiry-time": 1760000000
  },
  {
    "ip-address": "192.168.122.55",
    "mac-address": "52:54:00:aa:bb:03",
    "hostname": "Builder-MacOS",
    "expiry-time": 1760000100
  },
  {
    "ip-address": "192.168.122.56",
    "mac-address": "52:54:00:aa:bb:03",
    "hostname": "Builder-MacOS",
    "expiry-time": 1760000200
  }
]"#;

fn settings(lease_file: PathBuf) -> HypervisorSettings {
    HypervisorSettings {
        virsh: vec!["sudo".into(), "virsh".into()],
        lease_file,
        probe_interval_ms: 50,
        ..HypervisorSettings::default()
    }
}

fn controller(process: &FakeProcessRunner) -> VirshController<FakeProcessRunner> {
    VirshController::new(process.clone(), &settings(PathBuf::from("/nonexistent/leases")))
}

#[parameterized(
    exact = { "Builder-Win11", Some("192.168.122.40") },
    case_folded = { "builder-win11", Some("192.168.122.40") },
    last_lease_wins = { "Builder-MacOS", Some("192.168.122.56") },
    unknown = { "Builder-Linux", None },
)]
fn lease_lookup(domain: &str, expected: Option<&str>) {
    assert_eq!(lease_ip(LEASES, domain).unwrap().as_deref(), expected);
}

#[test]
fn empty_lease_file_has_no_leases() {
    assert_eq!(lease_ip("", "any").unwrap(), None);
    assert_eq!(lease_ip("[]", "any").unwrap(), None);
}

#[test]
fn malformed_lease_file_is_an_error() {
    assert!(lease_ip("{not json", "any").is_err());
}

#[parameterized(
    ten_percent = { 100_000, 10, 10_000 },
    full = { 100_000, 100, 100_000 },
    floor = { 5_000, 1, 1_000 },
    clamped = { 100_000, 200, 100_000 },
)]
fn quota_math(period: u64, share: u8, expected: i64) {
    assert_eq!(quota_for(period, share), expected);
}

#[tokio::test]
async fn ensure_running_skips_start_when_running() {
    let process = FakeProcessRunner::new();
    process.stdout("domstate", "running\n\n");

    controller(&process).ensure_running("Builder-Win11").await.unwrap();

    assert_eq!(process.commands(), vec!["sudo virsh domstate Builder-Win11"]);
}

#[tokio::test]
async fn ensure_running_starts_shut_off_guest() {
    let process = FakeProcessRunner::new();
    process.stdout("domstate", "shut off\n");

    controller(&process).ensure_running("Builder-Win11").await.unwrap();

    assert_eq!(
        process.commands(),
        vec!["sudo virsh domstate Builder-Win11", "sudo virsh start Builder-Win11"]
    );
}

#[tokio::test]
async fn failed_start_reports_stderr() {
    let process = FakeProcessRunner::new();
    process.stdout("domstate", "shut off\n");
    process.respond(
        "start",
        CapturedOutput { code: 1, stdout: String::new(), stderr: "error: domain not found\n".into() },
    );

    let err = controller(&process).ensure_running("ghost").await.unwrap_err();

    match err {
        VmError::Command { action, domain, detail } => {
            assert_eq!(action, "start");
            assert_eq!(domain, "ghost");
            assert_eq!(detail, "error: domain not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn throttle_and_restore_set_vcpu_quota() {
    let process = FakeProcessRunner::new();
    let vm = controller(&process);

    vm.throttle("Builder-MacOS", 10).await.unwrap();
    vm.restore("Builder-MacOS").await.unwrap();

    assert_eq!(
        process.commands(),
        vec![
            "sudo virsh schedinfo Builder-MacOS --live --set vcpu_quota=10000",
            "sudo virsh schedinfo Builder-MacOS --live --set vcpu_quota=-1",
        ]
    );
}

#[tokio::test]
async fn static_ip_wins_over_lease_file() {
    let process = FakeProcessRunner::new();

    let ip = controller(&process).resolve_ip("Builder-Win11", Some("10.0.0.5")).await.unwrap();

    assert_eq!(ip, "10.0.0.5");
}

#[tokio::test]
async fn resolve_ip_reads_lease_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("virbr0.status");
    std::fs::write(&path, LEASES).unwrap();
    let vm = VirshController::new(FakeProcessRunner::new(), &settings(path.clone()));

    assert_eq!(vm.resolve_ip("builder-macos", None).await.unwrap(), "192.168.122.56");
    let err = vm.resolve_ip("Builder-Linux", None).await.unwrap_err();
    assert!(matches!(err, VmError::NoLease { .. }));
}

#[tokio::test]
async fn missing_lease_file_is_a_read_error() {
    let err = controller(&FakeProcessRunner::new()).resolve_ip("any", None).await.unwrap_err();

    assert!(matches!(err, VmError::LeaseRead { .. }));
}

#[tokio::test]
async fn await_network_times_out_at_deadline() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let vm = controller(&FakeProcessRunner::new());
    let timeout = Duration::from_millis(800);
    let start = std::time::Instant::now();

    let err = vm.await_network("127.0.0.1", port, timeout).await.unwrap_err();

    assert!(start.elapsed() >= timeout);
    assert!(matches!(err, VmError::NetworkTimeout { timeout: t, .. } if t == timeout));
}
