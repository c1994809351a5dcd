/*!
 * Shared Test Fixtures
 * Kernel-like traces built from in-memory channels
 */

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use tracemerge::{
    event_hook, Event, EventTypeTable, HookSet, MemoryChannel, MemoryTrace, Timestamp, Trace,
    TraceSetContext, PRIORITY_DEFAULT,
};

pub const SYSCALL_ENTRY: u32 = 0;
pub const SYSCALL_EXIT: u32 = 1;
pub const SCHEDULE: u32 = 2;
pub const FORK: u32 = 3;
pub const EXIT: u32 = 4;
pub const TICK: u32 = 5;
pub const IRQ_ENTRY: u32 = 6;
pub const IRQ_EXIT: u32 = 7;
pub const EXEC: u32 = 8;

pub fn ts(nanos: u64) -> Timestamp {
    Timestamp::from_nanos(nanos)
}

pub fn kernel_types() -> EventTypeTable {
    EventTypeTable::new([
        "syscall_entry",
        "syscall_exit",
        "sched_schedule",
        "process_fork",
        "process_exit",
        "tick",
        "irq_entry",
        "irq_exit",
        "exec",
    ])
}

/// Channel of `tick` events at the given times
pub fn ticks(name: &str, cpu: u32, times: &[u64]) -> MemoryChannel {
    let events = times
        .iter()
        .map(|t| Event::new(ts(*t), TICK, cpu))
        .collect();
    MemoryChannel::new(name, events).on_cpu(cpu)
}

/// Channel of `tick` events every `step` ns from `start`
pub fn regular(name: &str, cpu: u32, start: u64, step: u64, count: u64) -> MemoryChannel {
    let times: Vec<u64> = (0..count).map(|i| start + i * step).collect();
    ticks(name, cpu, &times)
}

pub fn trace(name: &str, channels: Vec<MemoryChannel>) -> Trace {
    channels
        .into_iter()
        .fold(MemoryTrace::new(name, kernel_types()), MemoryTrace::with_channel)
        .into_trace()
}

pub fn traceset(channels: Vec<MemoryChannel>) -> TraceSetContext {
    TraceSetContext::new(vec![trace("trace0", channels)]).unwrap()
}

/// `(timestamp, trace, channel)` of every dispatched event
pub type Dispatched = Arc<Mutex<Vec<(u64, usize, usize)>>>;

pub fn recorder() -> (Dispatched, HookSet) {
    let seen: Dispatched = Arc::default();
    let sink = Arc::clone(&seen);
    let hooks = HookSet::new().on_event(
        event_hook(move |ctx| {
            let handle = ctx.handle();
            sink.lock()
                .push((ctx.timestamp().as_nanos(), handle.trace, handle.channel));
            false
        }),
        PRIORITY_DEFAULT,
    );
    (seen, hooks)
}
