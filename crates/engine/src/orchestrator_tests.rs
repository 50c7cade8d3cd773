// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::stages::{FakeStage, FakeStageExecutor};
use lc_adapters::FakePublisher;
use lc_core::FakeClock;
use tempfile::TempDir;

const MAX_FAILURES: u32 = 3;
const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

struct Harness {
    _dir: TempDir,
    clock: FakeClock,
    executor: FakeStageExecutor,
    publisher: FakePublisher,
    orchestrator: Orchestrator<FakeStageExecutor, FakePublisher, FakeClock>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let executor = FakeStageExecutor::new();
    let publisher = FakePublisher::new();
    let ledger = Ledger::open(dir.path().join("ledger.json"), RETENTION, clock.clone()).unwrap();
    let orchestrator = Orchestrator::new(
        executor.clone(),
        publisher.clone(),
        ledger,
        clock.clone(),
        vec![Stage::Host, Stage::Cloud],
        MAX_FAILURES,
    );
    Harness { _dir: dir, clock, executor, publisher, orchestrator }
}

fn commit(raw: &str) -> CommitId {
    CommitId::parse(raw).unwrap()
}

#[tokio::test]
async fn successful_attempt_records_success_and_publishes_once() {
    let mut h = harness();
    let c = commit("abc123");

    let report = h.orchestrator.attempt(&c).await.unwrap();

    assert!(report.succeeded);
    assert!(report.published);
    assert_eq!(report.outcomes.len(), 2);
    assert!(h.orchestrator.ledger().succeeded(&c));
    assert_eq!(h.orchestrator.ledger().failures(&c), 0);
    assert_eq!(h.publisher.published(), vec![c]);
}

#[tokio::test]
async fn any_failed_stage_fails_the_attempt_without_publishing() {
    let mut h = harness();
    h.executor.set(Stage::Cloud, FakeStage::Exit(1));
    let c = commit("abc123");

    let report = h.orchestrator.attempt(&c).await.unwrap();

    assert!(!report.succeeded);
    assert!(!report.published);
    assert_eq!(report.failed_stages(), vec![Stage::Cloud]);
    assert_eq!(h.orchestrator.ledger().failures(&c), 1);
    assert!(!h.orchestrator.ledger().succeeded(&c));
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn panicking_stage_is_recorded_as_one_failure() {
    let mut h = harness();
    h.executor.set(Stage::Host, FakeStage::Panic);
    let c = commit("abc123");

    let report = h.orchestrator.attempt(&c).await.unwrap();

    assert!(!report.succeeded);
    assert_eq!(report.failed_stages(), vec![Stage::Host]);
    assert_eq!(h.orchestrator.ledger().failures(&c), 1);
    assert_eq!(h.orchestrator.phase(), AttemptPhase::Idle);
}

#[tokio::test]
async fn succeeded_commit_is_never_dispatched_again() {
    let mut h = harness();
    let c = commit("abc123");
    h.orchestrator.attempt(&c).await.unwrap();
    let calls_after_first = h.executor.calls().len();

    for _ in 0..3 {
        assert!(h.orchestrator.run_if_needed(&c).await.unwrap().is_none());
    }

    assert_eq!(h.orchestrator.decide(&c), Decision::Skip(SkipReason::AlreadySucceeded));
    assert_eq!(h.executor.calls().len(), calls_after_first);
    assert_eq!(h.publisher.published().len(), 1);
}

#[tokio::test]
async fn failure_cap_stops_retries_until_expiry() {
    let mut h = harness();
    h.executor.set(Stage::Host, FakeStage::Exit(101));
    let c = commit("abc123");

    for _ in 0..MAX_FAILURES {
        assert!(h.orchestrator.run_if_needed(&c).await.unwrap().is_some());
    }
    assert!(h.orchestrator.run_if_needed(&c).await.unwrap().is_none());

    assert_eq!(h.orchestrator.ledger().failures(&c), MAX_FAILURES);
    assert_eq!(
        h.orchestrator.decide(&c),
        Decision::Skip(SkipReason::FailureCapReached { failures: MAX_FAILURES, max: MAX_FAILURES })
    );
    assert_eq!(h.executor.calls().iter().filter(|s| **s == Stage::Host).count(), MAX_FAILURES as usize);

    h.clock.advance(RETENTION + Duration::from_millis(1));
    assert_eq!(h.orchestrator.decide(&c), Decision::Dispatch);
}

#[tokio::test]
async fn commit_ids_match_case_insensitively() {
    let mut h = harness();
    h.orchestrator.attempt(&commit("abc123")).await.unwrap();

    assert_eq!(h.orchestrator.decide(&commit("ABC123")), Decision::Skip(SkipReason::AlreadySucceeded));
}

#[tokio::test]
async fn upper_case_head_with_no_entry_is_dispatched() {
    let mut h = harness();

    let report = h.orchestrator.run_if_needed(&commit("ABC123")).await.unwrap();

    assert!(report.is_some());
    assert!(h.orchestrator.ledger().succeeded(&commit("abc123")));
}

#[tokio::test]
async fn failed_publish_keeps_success_recorded() {
    let mut h = harness();
    h.publisher.fail();
    let c = commit("abc123");

    let report = h.orchestrator.attempt(&c).await.unwrap();

    assert!(report.succeeded);
    assert!(!report.published);
    assert!(h.orchestrator.ledger().succeeded(&c));
    assert_eq!(h.publisher.published().len(), 1);
}

#[tokio::test]
async fn stages_see_dispatched_phase_and_attempt_ends_idle() {
    let mut h = harness();
    h.executor.observe(h.orchestrator.phase_handle());

    h.orchestrator.attempt(&commit("abc123")).await.unwrap();

    assert_eq!(h.executor.observed_phases(), vec![AttemptPhase::Dispatched, AttemptPhase::Dispatched]);
    assert_eq!(h.orchestrator.phase(), AttemptPhase::Idle);
}

#[tokio::test]
async fn forgive_clears_failures() {
    let mut h = harness();
    h.executor.set(Stage::Cloud, FakeStage::Exit(1));
    let c = commit("abc123");
    for _ in 0..MAX_FAILURES {
        h.orchestrator.attempt(&c).await.unwrap();
    }

    h.orchestrator.forgive(&c).unwrap();

    assert_eq!(h.orchestrator.decide(&c), Decision::Dispatch);
}

#[tokio::test]
async fn empty_stage_list_never_counts_as_success() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let ledger = Ledger::open(dir.path().join("ledger.json"), RETENTION, clock.clone()).unwrap();
    let publisher = FakePublisher::new();
    let mut orchestrator =
        Orchestrator::new(FakeStageExecutor::new(), publisher.clone(), ledger, clock, Vec::new(), MAX_FAILURES);

    let report = orchestrator.attempt(&commit("abc123")).await.unwrap();

    assert!(!report.succeeded);
    assert!(publisher.published().is_empty());
}
