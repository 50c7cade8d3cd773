// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lc_adapters::FakeProcessRunner;

fn plan(workdir: &Path, targets: &[&str], debug: bool) -> CompilePlan {
    CompilePlan {
        workdir: workdir.to_path_buf(),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        rustflags: Some("-C target-cpu=x86-64-v3".into()),
        debug,
        binary_names: vec!["full-crisis".into(), "full-crisis.exe".into()],
    }
}

#[tokio::test]
async fn builds_each_target_in_release() {
    let dir = tempfile::tempdir().unwrap();
    let process = FakeProcessRunner::new();
    let plan = plan(dir.path(), &["x86_64-unknown-linux-gnu", "aarch64-unknown-linux-gnu"], false);

    compile(&process, &plan, "[ host ] ").await.unwrap();

    assert_eq!(
        process.commands(),
        vec![
            "rustup target add x86_64-unknown-linux-gnu",
            "cargo build --release --target=x86_64-unknown-linux-gnu",
            "rustup target add aarch64-unknown-linux-gnu",
            "cargo build --release --target=aarch64-unknown-linux-gnu",
        ]
    );
    let calls = process.calls();
    let cargo = &calls[1];
    assert_eq!(cargo.cwd.as_deref(), Some(dir.path()));
    assert_eq!(cargo.env, vec![("RUSTFLAGS".to_string(), "-C target-cpu=x86-64-v3".to_string())]);
}

#[tokio::test]
async fn debug_build_precedes_release() {
    let dir = tempfile::tempdir().unwrap();
    let process = FakeProcessRunner::new();

    compile(&process, &plan(dir.path(), &["x86_64-pc-windows-gnu"], true), "").await.unwrap();

    assert_eq!(
        process.commands(),
        vec![
            "rustup target add x86_64-pc-windows-gnu",
            "cargo build --target=x86_64-pc-windows-gnu",
            "cargo build --release --target=x86_64-pc-windows-gnu",
        ]
    );
}

#[tokio::test]
async fn rustup_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let process = FakeProcessRunner::new();
    process.spawn_fails("rustup");

    compile(&process, &plan(dir.path(), &["x86_64-apple-darwin"], false), "").await.unwrap();

    assert_eq!(process.commands().len(), 2);
}

#[tokio::test]
async fn failed_build_stops_remaining_targets() {
    let dir = tempfile::tempdir().unwrap();
    let process = FakeProcessRunner::new();
    process.exit_with("cargo build --release --target=x86_64-apple-darwin", 101);

    let err = compile(&process, &plan(dir.path(), &["x86_64-apple-darwin", "aarch64-apple-darwin"], false), "")
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::Compile { ref target, release: true, code: 101 } if target == "x86_64-apple-darwin"));
    assert!(!process.commands().iter().any(|c| c.contains("aarch64")));
}

#[tokio::test]
async fn stale_binaries_are_deleted_before_building() {
    let dir = tempfile::tempdir().unwrap();
    let release = dir.path().join("target/x86_64-pc-windows-gnu/release");
    std::fs::create_dir_all(&release).unwrap();
    std::fs::write(release.join("full-crisis.exe"), b"old").unwrap();
    std::fs::write(release.join("keep.txt"), b"other").unwrap();

    compile(&FakeProcessRunner::new(), &plan(dir.path(), &["x86_64-pc-windows-gnu"], false), "").await.unwrap();

    assert!(!release.join("full-crisis.exe").exists());
    assert!(release.join("keep.txt").exists());
}

#[test]
fn guest_plan_uses_guest_workdir_without_rustflags() {
    let build = lc_core::BuildSettings {
        repo_dir: PathBuf::from("/j/proj/full-crisis"),
        dispatch: vec![lc_core::Stage::Cloud],
        artifacts: Vec::new(),
        binary_names: vec!["full-crisis".into()],
        debug: false,
        artifact_max_depth: 12,
    };
    let guest = lc_core::GuestSettings {
        stage: lc_core::Stage::GuestMac,
        domain: "Builder-MacOS".into(),
        ip: None,
        port: 22,
        user: "builder".into(),
        password_file: None,
        password_env: Some("PW".into()),
        workdir: "/Volumes/nfs/full-crisis".into(),
        command: "lcloudd stage guest-macos".into(),
        targets: vec!["aarch64-apple-darwin".into()],
        prepare: Vec::new(),
    };

    let plan = CompilePlan::for_guest(&build, &guest);

    assert_eq!(plan.workdir, PathBuf::from("/Volumes/nfs/full-crisis"));
    assert_eq!(plan.rustflags, None);
    assert_eq!(plan.cargo_build("aarch64-apple-darwin", true).env, Vec::new());
}

#[test]
fn stale_binaries_cover_every_profile_and_name() {
    let plan = plan(Path::new("/work"), &[], false);

    assert_eq!(
        plan.stale_binaries("x86_64-pc-windows-gnu"),
        vec![
            PathBuf::from("/work/target/x86_64-pc-windows-gnu/release/full-crisis"),
            PathBuf::from("/work/target/x86_64-pc-windows-gnu/release/full-crisis.exe"),
            PathBuf::from("/work/target/x86_64-pc-windows-gnu/debug/full-crisis"),
            PathBuf::from("/work/target/x86_64-pc-windows-gnu/debug/full-crisis.exe"),
        ]
    );
}
