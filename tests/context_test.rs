/*!
 * Context Hierarchy Tests
 */

mod common;

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tracemerge::{
    ChannelHandle, ContextError, MemoryChannel, MemoryTrace, PositionError, Timestamp,
    TraceError, TraceSetContext,
};

#[test]
fn test_time_span_covers_non_empty_traces() {
    let ctx = TraceSetContext::new(vec![
        trace("a", vec![ticks("cpu0", 0, &[10, 20])]),
        trace("b", vec![ticks("cpu0", 0, &[5]), ticks("cpu1", 1, &[50])]),
        trace("empty", vec![MemoryChannel::new("cpu0", Vec::new())]),
    ])
    .unwrap();

    let span = ctx.time_span();
    assert_eq!((span.start, span.end), (ts(5), ts(50)));
    assert_eq!(ctx.next_timestamp(), ts(5));
    assert_eq!(ctx.channel_count(), 4);
    assert_eq!(ctx.pending_channels(), 3);
    assert!(!ctx.trace(2).unwrap().has_events());
}

#[test]
fn test_channel_accessors() {
    let ctx = traceset(vec![ticks("cpu0", 0, &[1, 2, 3]), ticks("cpu1", 1, &[7])]);
    let channel = ctx.channel(ChannelHandle::new(0, 1)).unwrap();
    assert_eq!(channel.name(), "cpu1");
    assert_eq!(channel.cpu(), Some(1));
    assert_eq!(channel.event_count(), 1);
    assert_eq!(channel.timestamp(), ts(7));
    assert!(ctx.channel(ChannelHandle::new(0, 2)).is_none());
    assert!(ctx.channel(ChannelHandle::new(3, 0)).is_none());
}

#[test]
fn test_add_trace_restarts_and_invalidates_positions() {
    let mut ctx = TraceSetContext::new(vec![trace("a", vec![ticks("cpu0", 0, &[10, 20])])])
        .unwrap();
    ctx.process_until(Timestamp::INFINITE, Some(1), None).unwrap();
    let position = ctx.save_position();

    let index = ctx
        .add_trace(trace("b", vec![ticks("cpu0", 0, &[3, 30])]))
        .unwrap();
    assert_eq!(index, 1);
    assert_eq!(ctx.roster(), 1);
    assert_eq!(ctx.next_timestamp(), ts(3));
    assert_eq!(ctx.time_span().end, ts(30));

    match ctx.restore_position(&position).unwrap_err() {
        TraceError::Position(PositionError::RosterMismatch {
            expected_slots,
            actual_slots,
            ..
        }) => assert_eq!((expected_slots, actual_slots), (1, 2)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_roster_change_refused_while_hooks_installed() {
    let mut ctx = traceset(vec![ticks("cpu0", 0, &[1])]);
    let (_, hooks) = recorder();
    ctx.begin(&hooks).unwrap();

    assert!(matches!(
        ctx.add_trace(trace("b", Vec::new())),
        Err(TraceError::Context(ContextError::HooksInstalled(1)))
    ));
    assert!(matches!(
        ctx.remove_trace(0),
        Err(TraceError::Context(ContextError::HooksInstalled(1)))
    ));

    ctx.end(&hooks).unwrap();
    assert_eq!(ctx.remove_trace(0).unwrap().name, "trace0");
    assert_eq!(ctx.next_timestamp(), Timestamp::INFINITE);
}

#[test]
fn test_remove_trace_renumbers_and_keeps_read_heads() {
    let mut ctx = TraceSetContext::new(vec![
        trace("a", vec![ticks("cpu0", 0, &[1, 4])]),
        trace("b", vec![ticks("cpu0", 0, &[2, 5])]),
        trace("c", vec![ticks("cpu0", 0, &[3, 6])]),
    ])
    .unwrap();
    ctx.process_until(Timestamp::INFINITE, Some(3), None).unwrap();

    let removed = ctx.remove_trace(1).unwrap();
    assert_eq!(removed.name, "b");
    assert_eq!(ctx.roster(), 1);
    assert_eq!(ctx.traces()[1].name(), "c");
    assert_eq!(ctx.traces()[1].index(), 1);
    assert_eq!(
        ctx.traces()[1].channels()[0].handle(),
        ChannelHandle::new(1, 0)
    );

    let (seen, hooks) = recorder();
    ctx.begin(&hooks).unwrap();
    ctx.process_until(Timestamp::INFINITE, None, None).unwrap();
    ctx.end(&hooks).unwrap();
    assert_eq!(*seen.lock(), vec![(4, 0, 0), (6, 1, 0)]);

    assert!(matches!(
        ctx.remove_trace(5),
        Err(TraceError::Context(ContextError::TraceNotFound(5)))
    ));
}

#[test]
fn test_end_without_begin() {
    let mut ctx = traceset(vec![ticks("cpu0", 0, &[1])]);
    let (_, hooks) = recorder();
    assert!(matches!(
        ctx.end(&hooks),
        Err(TraceError::Context(ContextError::NotInstalled))
    ));
}

#[derive(Default)]
struct Counter(Mutex<u64>);

#[test]
fn test_attributes_are_per_layer() {
    let ctx = traceset(vec![ticks("cpu0", 0, &[1]), ticks("cpu1", 1, &[1])]);
    ctx.attributes().insert(Counter(Mutex::new(1)));
    *ctx.trace(0)
        .unwrap()
        .attributes()
        .get_or_insert_with(Counter::default)
        .0
        .lock() += 2;
    let channel = ctx.channel(ChannelHandle::new(0, 1)).unwrap();
    channel.attributes().insert(7u32);

    assert_eq!(*ctx.attributes().get::<Counter>().unwrap().0.lock(), 1);
    assert_eq!(
        *ctx.trace(0).unwrap().attributes().get::<Counter>().unwrap().0.lock(),
        2
    );
    assert_eq!(channel.attributes().get::<u32>().as_deref(), Some(&7));
    assert!(ctx
        .channel(ChannelHandle::new(0, 0))
        .unwrap()
        .attributes()
        .is_empty());
}

#[test]
fn test_trace_in_use_flag() {
    let ctx = traceset(vec![ticks("cpu0", 0, &[1])]);
    let trace = ctx.trace(0).unwrap();
    assert!(trace.try_acquire());
    assert!(trace.is_in_use());
    assert!(!trace.try_acquire());
    trace.release();
    assert!(trace.try_acquire());
}

#[test]
fn test_trace_from_json() {
    let json = r#"{
        "name": "kernel",
        "event_types": ["tick", "syscall_entry"],
        "metadata": {"syscall_names": ["read", "write"]},
        "channels": [
            {"name": "cpu1", "cpu": 1, "events": [
                {"timestamp": 20, "event_type": 0, "cpu": 1},
                {"timestamp": 10, "event_type": 1, "cpu": 1, "fields": [["id", 1]]}
            ]}
        ]
    }"#;
    let trace = MemoryTrace::from_json(json).unwrap();
    assert_eq!(trace.metadata.syscall_names.len(), 2);

    let ctx = TraceSetContext::new(vec![trace.into()]).unwrap();
    let kernel = ctx.trace(0).unwrap();
    assert_eq!(kernel.event_types().id_of("syscall_entry"), Some(1));
    assert_eq!(kernel.channels()[0].cpu(), Some(1));
    let first = kernel.channels()[0].current_event().unwrap();
    assert_eq!(first.timestamp, ts(10));
    assert_eq!(first.field_u64("id"), Some(1));
}
