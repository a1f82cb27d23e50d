// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use runq_core::PlanSpec;
use tokio::sync::mpsc;

use super::*;
use crate::profile::PlanDef;

fn item_named(name: &str) -> PlanItem {
    PlanSpec::new(name).into_item(PlanUid::new(), 0)
}

fn fast(steps: u32) -> ExecutionParams {
    ExecutionParams { steps, step_delay: Duration::from_millis(1) }
}

async fn next_status(rx: &mut mpsc::Receiver<PlanTransition>) -> PlanStatus {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transition")
        .expect("transition channel closed")
        .status
}

#[tokio::test]
async fn plan_runs_to_completion() {
    let (_control_tx, control_rx) = mpsc::channel(8);
    let (status_tx, mut status_rx) = mpsc::channel(16);

    tokio::spawn(run_plan(item_named("count"), fast(3), control_rx, status_tx));

    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Running);
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Completed);
}

#[tokio::test]
async fn deferred_pause_then_resume_completes() {
    let (control_tx, control_rx) = mpsc::channel(8);
    let (status_tx, mut status_rx) = mpsc::channel(16);

    tokio::spawn(run_plan(
        item_named("count"),
        ExecutionParams { steps: 50, step_delay: Duration::from_millis(5) },
        control_rx,
        status_tx,
    ));

    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Running);
    control_tx.send(EngineControl::Pause(PauseMode::Deferred)).await.unwrap();
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Paused);

    control_tx.send(EngineControl::Resume).await.unwrap();
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Running);
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Completed);
}

#[tokio::test]
async fn immediate_pause_interrupts_a_long_step() {
    let (control_tx, control_rx) = mpsc::channel(8);
    let (status_tx, mut status_rx) = mpsc::channel(16);

    // A single step long enough that only an immediate pause can interrupt
    // it within the test timeout.
    tokio::spawn(run_plan(
        item_named("count"),
        ExecutionParams { steps: 1, step_delay: Duration::from_secs(30) },
        control_rx,
        status_tx,
    ));

    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Running);
    control_tx.send(EngineControl::Pause(PauseMode::Immediate)).await.unwrap();
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Paused);

    control_tx.send(EngineControl::Abort).await.unwrap();
    assert_eq!(next_status(&mut status_rx).await, PlanStatus::Aborted);
}

fn run<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(f)
}

#[yare::parameterized(
    stop  = { EngineControl::Stop,  PlanStatus::Stopped },
    abort = { EngineControl::Abort, PlanStatus::Aborted },
    halt  = { EngineControl::Halt,  PlanStatus::Halted },
)]
fn continuation_from_pause(control: EngineControl, expected: PlanStatus) {
    run(async {
        let (control_tx, control_rx) = mpsc::channel(8);
        let (status_tx, mut status_rx) = mpsc::channel(16);

        tokio::spawn(run_plan(
            item_named("count"),
            ExecutionParams { steps: 100, step_delay: Duration::from_millis(5) },
            control_rx,
            status_tx,
        ));

        assert_eq!(next_status(&mut status_rx).await, PlanStatus::Running);
        control_tx.send(EngineControl::Pause(PauseMode::Deferred)).await.unwrap();
        assert_eq!(next_status(&mut status_rx).await, PlanStatus::Paused);

        control_tx.send(control).await.unwrap();
        assert_eq!(next_status(&mut status_rx).await, expected);
    })
}

#[test]
fn kwargs_override_plan_defaults() {
    let def = PlanDef { name: "count".into(), default_steps: 10, step_delay_ms: 100 };
    let mut spec = PlanSpec::new("count");
    spec.kwargs.insert("num".into(), serde_json::json!(3));
    spec.kwargs.insert("delay".into(), serde_json::json!(0.5));
    let item = spec.into_item(PlanUid::new(), 0);

    let params = ExecutionParams::resolve(&item, &def);
    assert_eq!(params.steps, 3);
    assert_eq!(params.step_delay, Duration::from_millis(500));
}

#[test]
fn defaults_apply_without_kwargs() {
    let def = PlanDef { name: "count".into(), default_steps: 10, step_delay_ms: 100 };
    let item = item_named("count");
    let params = ExecutionParams::resolve(&item, &def);
    assert_eq!(params.steps, 10);
    assert_eq!(params.step_delay, Duration::from_millis(100));
}

#[test]
fn zero_steps_clamps_to_one() {
    let def = PlanDef { name: "count".into(), default_steps: 10, step_delay_ms: 1 };
    let mut spec = PlanSpec::new("count");
    spec.kwargs.insert("num".into(), serde_json::json!(0));
    let item = spec.into_item(PlanUid::new(), 0);
    assert_eq!(ExecutionParams::resolve(&item, &def).steps, 1);
}
