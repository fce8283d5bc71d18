mod common;

use common::*;
use jdbroker::broker::adapter::{DebugTarget, Location, StepDepth, Value};
use jdbroker::broker::error::Error;
use jdbroker::broker::stop::StopKind;
use std::sync::Arc;
use std::time::Duration;

fn world() -> Arc<MockTarget> {
    let target = Arc::new(MockTarget::new());
    target.add_class_full(
        "demo.Loop",
        &[5, 6, 7],
        vec![],
        vec![
            method("demo.Loop", "tick", &[]),
            method("demo.Loop", "tock", &[]),
        ],
        false,
    );
    target.add_class_full(
        "demo.Helper",
        &[],
        vec![],
        vec![method("demo.Helper", "assist", &[])],
        false,
    );
    target.add_thread(
        1,
        "main",
        true,
        vec![MockFrame {
            location: Location {
                type_name: "demo.Loop".to_string(),
                method_name: "run".to_string(),
                method_signature: "()V".to_string(),
                line: 5,
            },
            this: None,
            locals: vec![local(
                "helper",
                "demo.Helper",
                Value::Object {
                    id: 77,
                    type_name: "demo.Helper".to_string(),
                },
            )],
            args: vec![],
        }],
    );
    target
}

#[test]
fn test_step_completes_and_deletes_its_request() {
    let target = world();
    let broker = connected_broker(target.clone());
    target.set_step_landing(target.line_location("demo.Loop", 6));

    broker.step(Some(1), StepDepth::Over).unwrap();
    let reason = broker.session().wait_for_stop(Duration::from_secs(5));
    assert_eq!(reason.kind, StopKind::StepComplete);
    assert_eq!(reason.location.as_ref().unwrap().line, 6);

    // one-shot: the fired request is gone
    assert_eq!(target.live_requests_of_kind("step"), 0);
    assert!(!target.deleted_requests().is_empty());
}

#[test]
fn test_step_replaces_stale_request_on_same_thread() {
    let target = world();
    let broker = connected_broker(target.clone());

    // no landing configured: the step request stays armed and the target
    // keeps running, emulating a step that never completes
    broker.step(Some(1), StepDepth::Into).unwrap();
    assert_eq!(target.live_requests_of_kind("step"), 1);

    target.suspend().unwrap();
    broker.step(Some(1), StepDepth::Into).unwrap();
    // the stale request was deleted before the new one was created
    assert_eq!(target.live_requests_of_kind("step"), 1);
}

#[test]
fn test_step_requires_suspension_and_line_info() {
    let target = world();
    target.add_thread(2, "runner", false, vec![]);
    target.add_thread(
        3,
        "native",
        true,
        vec![frame_at(Location {
            type_name: "demo.Nat".to_string(),
            method_name: "poll".to_string(),
            method_signature: "()V".to_string(),
            line: -1,
        })],
    );
    let broker = connected_broker(target.clone());

    assert!(matches!(
        broker.step(Some(2), StepDepth::Into),
        Err(Error::ThreadNotSuspended(_))
    ));
    assert!(matches!(
        broker.step(Some(3), StepDepth::Into),
        Err(Error::NativeFrame)
    ));
}

#[test]
fn test_run_to_line_reached() {
    let target = world();
    let broker = connected_broker(target.clone());

    let thread = jdbroker::broker::adapter::ThreadRef {
        id: 1,
        name: "main".to_string(),
    };
    target.on_next_resume(
        jdbroker::broker::adapter::SuspendPolicy::All,
        vec![jdbroker::broker::adapter::Event::Breakpoint {
            request: jdbroker::broker::adapter::RequestHandle(999),
            thread,
            location: target.line_location("demo.Loop", 7),
        }],
    );

    let outcome = broker
        .run_to_line("demo.Loop", 7, Duration::from_secs(5))
        .unwrap();
    assert!(outcome.reached);
    assert_eq!(outcome.stop.kind, StopKind::BreakpointHit);

    // the temporary breakpoint is gone
    assert!(broker.breakpoints().list().is_empty());
    assert_eq!(target.live_requests_of_kind("breakpoint"), 0);
}

#[test]
fn test_run_to_line_timeout_leaves_no_artefact() {
    let target = world();
    let broker = connected_broker(target.clone());

    let outcome = broker
        .run_to_line("demo.Loop", 6, Duration::from_millis(300))
        .unwrap();
    assert!(!outcome.reached);
    assert!(!outcome.stop.is_stopped());

    assert!(broker.breakpoints().list().is_empty());
    assert_eq!(target.live_requests_of_kind("breakpoint"), 0);
}

#[test]
fn test_smart_step_listing_dedupes_and_caps() {
    let target = world();
    let broker = connected_broker(target.clone());

    let candidates = broker.smart_step_candidates(Some(1)).unwrap();
    assert!(candidates.contains(&"demo.Loop.tick".to_string()));
    assert!(candidates.contains(&"demo.Helper.assist".to_string()));
    assert!(candidates.len() <= 20);

    let unique: std::collections::HashSet<_> = candidates.iter().collect();
    assert_eq!(unique.len(), candidates.len());
}

#[test]
fn test_smart_step_into_uses_class_filter() {
    let target = world();
    let broker = connected_broker(target.clone());

    broker.smart_step_into(Some(1), Some("demo.Helper")).unwrap();
    assert_eq!(target.resume_count(), 1);

    let step_handles: Vec<_> = (1u64..100)
        .map(jdbroker::broker::adapter::RequestHandle)
        .filter_map(|h| target.request(h))
        .filter(|r| r.kind == "step")
        .collect();
    assert_eq!(step_handles.len(), 1);
    assert!(step_handles[0].detail.contains("filter=demo.Helper"));
}

#[test]
fn test_async_stack_summary_groups_pools() {
    let target = world();
    target.add_thread(10, "pool-1-thread-1", true, vec![]);
    target.add_thread(11, "pool-1-thread-2", true, vec![]);
    target.add_thread(
        12,
        "futures-worker",
        true,
        vec![frame_at(Location {
            type_name: "java.util.concurrent.CompletableFuture$AsyncSupply".to_string(),
            method_name: "run".to_string(),
            method_signature: "()V".to_string(),
            line: 0,
        })],
    );
    let broker = connected_broker(target.clone());

    let summary = broker.async_stack_summary().unwrap();
    assert!(summary.contains("pool `pool-1`"));
    assert!(summary.contains("futures-worker"));
    assert!(summary.contains("java.util.concurrent.CompletableFuture"));
}
