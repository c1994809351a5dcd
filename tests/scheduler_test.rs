/*!
 * Merge Scheduler Tests
 * Dispatch order, stop conditions and channel failures
 */

mod common;

use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracemerge::{event_hook, HookSet, Timestamp, TraceError, TraceSetContext, PRIORITY_DEFAULT};

#[test]
fn test_equal_timestamps_break_ties_by_channel() {
    let mut ctx = traceset(vec![ticks("cpu0", 0, &[10, 20]), ticks("cpu1", 1, &[10])]);
    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();

    let n = ctx.process_until(Timestamp::INFINITE, None, None).unwrap();
    ctx.end(&hooks).unwrap();

    assert_eq!(n, 3);
    assert_eq!(*seen.lock(), vec![(10, 0, 0), (10, 0, 1), (20, 0, 0)]);
}

#[test]
fn test_traces_interleave() {
    let mut ctx = TraceSetContext::new(vec![
        trace("a", vec![ticks("cpu0", 0, &[5, 15])]),
        trace("b", vec![ticks("cpu0", 0, &[5, 10])]),
    ])
    .unwrap();
    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();
    ctx.process_until(Timestamp::INFINITE, None, None).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![(5, 0, 0), (5, 1, 0), (10, 1, 0), (15, 0, 0)]
    );
}

#[test]
fn test_end_time_is_exclusive() {
    let mut ctx = traceset(vec![regular("cpu0", 0, 0, 10, 10)]);
    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();

    assert_eq!(ctx.process_until(ts(30), None, None).unwrap(), 3);
    assert_eq!(ctx.next_timestamp(), ts(30));
    assert_eq!(ctx.process_until(ts(30), None, None).unwrap(), 0);
    assert_eq!(seen.lock().len(), 3);
}

#[test]
fn test_max_events_chunks_the_run() {
    let mut ctx = traceset(vec![regular("cpu0", 0, 0, 10, 7), regular("cpu1", 1, 5, 10, 7)]);
    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();

    let mut chunks = Vec::new();
    loop {
        let n = ctx.process_until(Timestamp::INFINITE, Some(4), None).unwrap();
        if n == 0 {
            break;
        }
        chunks.push(n);
    }
    assert_eq!(chunks, vec![4, 4, 4, 2]);
    assert_eq!(ctx.pending_channels(), 0);
    assert!(seen.lock().windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_end_position_stops_on_reaching_it() {
    let mut ctx = traceset(vec![regular("cpu0", 0, 0, 10, 5), regular("cpu1", 1, 5, 10, 5)]);
    ctx.process_until(Timestamp::INFINITE, Some(6), None).unwrap();
    let target = ctx.save_position();
    ctx.seek_time(Timestamp::ZERO).unwrap();

    let n = ctx
        .process_until(Timestamp::INFINITE, None, Some(&target))
        .unwrap();
    assert_eq!(n, 6);
    assert_eq!(ctx.compare_position(&target).unwrap(), std::cmp::Ordering::Equal);
}

#[test]
fn test_hook_requests_stop_after_event() {
    let mut ctx = traceset(vec![regular("cpu0", 0, 0, 10, 10)]);
    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);
    let hooks = HookSet::new().on_event(
        event_hook(move |_| counter.fetch_add(1, Ordering::Relaxed) + 1 == 3),
        PRIORITY_DEFAULT,
    );
    ctx.begin(&hooks).unwrap();

    assert_eq!(ctx.process_until(Timestamp::INFINITE, None, None).unwrap(), 3);
    assert_eq!(ctx.next_timestamp(), ts(30));
    assert_eq!(ctx.process_until(Timestamp::INFINITE, None, None).unwrap(), 7);
}

#[test]
fn test_empty_traceset() {
    let mut ctx = TraceSetContext::new(Vec::new()).unwrap();
    assert_eq!(ctx.process_until(Timestamp::INFINITE, None, None).unwrap(), 0);

    let mut ctx = traceset(vec![ticks("cpu0", 0, &[])]);
    assert_eq!(ctx.pending_channels(), 0);
    assert_eq!(ctx.process_until(Timestamp::INFINITE, None, None).unwrap(), 0);
}

#[test]
fn test_corrupt_channel_aborts_run() {
    let mut ctx = traceset(vec![
        ticks("cpu0", 0, &[10, 20, 30, 40]).with_corruption_at(2),
        ticks("cpu1", 1, &[15, 25, 35]),
    ]);
    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();

    let err = ctx
        .process_until(Timestamp::INFINITE, None, None)
        .unwrap_err();
    match err {
        TraceError::Channel { handle, .. } => assert_eq!((handle.trace, handle.channel), (0, 0)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(seen.lock().len(), 3);

    // The failed channel is retired; the rest of the traceset still runs.
    assert_eq!(ctx.process_until(Timestamp::INFINITE, None, None).unwrap(), 2);
    assert_eq!(ctx.pending_channels(), 0);
}

proptest! {
    #[test]
    fn prop_dispatch_keys_never_decrease(
        layout in prop::collection::vec(
            prop::collection::vec(prop::collection::vec(0u64..200, 0..20), 1..4),
            1..3,
        )
    ) {
        let total: usize = layout.iter().flatten().map(Vec::len).sum();
        let traces = layout
            .iter()
            .enumerate()
            .map(|(t, channels)| {
                let channels = channels
                    .iter()
                    .enumerate()
                    .map(|(c, times)| ticks(&format!("cpu{c}"), c as u32, times))
                    .collect();
                trace(&format!("trace{t}"), channels)
            })
            .collect();
        let mut ctx = TraceSetContext::new(traces).unwrap();
        let (seen, hooks) = recorder();
        ctx.begin(&hooks).unwrap();

        let n = ctx.process_until(Timestamp::INFINITE, None, None).unwrap();
        prop_assert_eq!(n as usize, total);
        let seen = seen.lock();
        prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
