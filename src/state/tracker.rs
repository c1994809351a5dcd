/*!
 * State Tracker
 * Installs the state hooks and restores state at arbitrary times
 */

use super::names::StateEvent;
use super::snapshot::SavedStates;
use super::trace::TraceState;
use super::types::Process;
use crate::context::{EventContext, TraceSetContext};
use crate::core::errors::{Result, StateError, TraceError};
use crate::core::types::{Cpu, Pid, Timestamp};
use crate::hooks::{event_hook, EventHookFn, HookSet, Priority, PRIORITY_STATE};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Priority of the snapshot hook, just ahead of the state hooks
const PRIORITY_SNAPSHOT: Priority = PRIORITY_STATE - 1;

type SharedStates = Arc<Mutex<Vec<TraceState>>>;

/// Process state reconstruction for every trace of a traceset
///
/// Built for the traceset's roster at creation time. Install
/// [`hooks`](Self::hooks) with `TraceSetContext::begin` to follow the merged
/// stream; the state of each trace is updated at [`PRIORITY_STATE`], so
/// hooks at the default priority observe it already updated.
pub struct StateTracker {
    states: SharedStates,
    hooks: HookSet,
    roster: u64,
    save_interval: u64,
}

impl StateTracker {
    pub fn new(ctx: &TraceSetContext) -> Result<Self> {
        let states: SharedStates = Arc::new(Mutex::new(
            ctx.traces().iter().map(TraceState::new).collect(),
        ));
        let save_interval = ctx.config().save_interval;

        let mut hooks = HookSet::new().on_event(
            {
                let states = Arc::clone(&states);
                event_hook(move |ctx| {
                    if let Some(state) = states.lock().get_mut(ctx.trace.index()) {
                        state.observe(ctx.trace, ctx.timestamp(), save_interval);
                    }
                    false
                })
            },
            PRIORITY_SNAPSHOT,
        );

        let routes: Vec<(usize, Vec<_>)> = states
            .lock()
            .iter()
            .map(|s| (s.trace_index(), s.routes().ids().collect()))
            .collect();
        for (trace, ids) in routes {
            for (id, kind) in ids {
                hooks = hooks.on_channel_event_id(
                    Some(trace),
                    None,
                    id,
                    state_hook(Arc::clone(&states), kind),
                    PRIORITY_STATE,
                )?;
            }
        }

        info!(
            traces = ctx.traces().len(),
            save_interval,
            "state tracker created"
        );
        Ok(Self {
            states,
            hooks,
            roster: ctx.roster(),
            save_interval,
        })
    }

    /// Hook set to pass to `begin` / `end`
    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub fn save_interval(&self) -> u64 {
        self.save_interval
    }

    pub fn trace_count(&self) -> usize {
        self.states.lock().len()
    }

    fn check_roster(&self, ctx: &TraceSetContext) -> std::result::Result<(), StateError> {
        if ctx.roster() != self.roster {
            return Err(StateError::RosterChanged {
                expected: self.roster,
                actual: ctx.roster(),
            });
        }
        Ok(())
    }

    /// Run `f` on one trace's state
    pub fn with_trace<R>(
        &self,
        trace: usize,
        f: impl FnOnce(&TraceState) -> R,
    ) -> std::result::Result<R, StateError> {
        let states = self.states.lock();
        states
            .get(trace)
            .map(f)
            .ok_or(StateError::TraceNotTracked(trace))
    }

    /// Copy of a process; `cpu` only matters for the idle task
    pub fn process(&self, trace: usize, pid: Pid, cpu: Cpu) -> Option<Process> {
        self.with_trace(trace, |s| s.processes().get(pid, cpu).cloned())
            .ok()
            .flatten()
    }

    /// Copy of the process running on `cpu`
    pub fn running(&self, trace: usize, cpu: Cpu) -> Option<Process> {
        self.with_trace(trace, |s| s.processes().running(cpu).cloned())
            .ok()
            .flatten()
    }

    /// Copy of one trace's snapshot archive
    pub fn saved_states(&self, trace: usize) -> std::result::Result<SavedStates, StateError> {
        self.with_trace(trace, |s| s.saved_states().clone())
    }

    /// Replace one trace's snapshot archive, e.g. with one read from disk
    pub fn load_saved_states(
        &self,
        trace: usize,
        saved: SavedStates,
    ) -> std::result::Result<(), StateError> {
        let mut states = self.states.lock();
        let state = states
            .get_mut(trace)
            .ok_or(StateError::TraceNotTracked(trace))?;
        debug!(trace, snapshots = saved.len(), "snapshot archive adopted");
        state.replace_saved_states(saved);
        Ok(())
    }

    /// Feed one event to the state layer without going through installed
    /// hooks
    pub fn observe(&self, ctx: &EventContext<'_>) {
        let mut states = self.states.lock();
        let Some(state) = states.get_mut(ctx.trace.index()) else {
            return;
        };
        state.observe(ctx.trace, ctx.timestamp(), self.save_interval);
        if let Some(kind) = state.routes().route(ctx.event.event_type) {
            state.apply(kind, ctx.event, ctx.cpu(), ctx.timestamp());
        }
    }

    /// Put every trace back to its initial state and the traceset at its
    /// start; snapshots are kept
    pub fn reset(&self, ctx: &mut TraceSetContext) -> Result<()> {
        self.check_roster(ctx)?;
        for state in self.states.lock().iter_mut() {
            state.reset();
        }
        ctx.seek_time(ctx.time_span().start)
    }

    /// Position every trace at its latest snapshot not after `t`
    ///
    /// Traces without such a snapshot get their initial state and their
    /// channels go back to the traceset start. Returns the earliest point
    /// any trace restarts from. On error every trace is reset and the
    /// traceset is left at its start.
    pub fn seek_time_closest(&self, ctx: &mut TraceSetContext, t: Timestamp) -> Result<Timestamp> {
        self.check_roster(ctx)?;
        let start = ctx.time_span().start;
        let mut states = self.states.lock();
        let restored = restore_closest(&mut states, ctx, t, start);
        if restored.is_err() {
            states.iter_mut().for_each(TraceState::reset);
        }
        drop(states);

        match restored {
            Ok(earliest) => {
                ctx.rebuild_queue();
                Ok(earliest)
            }
            Err(err) => {
                warn!(target_time = %t, error = %err, "snapshot restore failed, back to the start");
                if let Err(reseek) = ctx.seek_time(start) {
                    warn!(error = %reseek, "could not seek back to the start");
                }
                ctx.rebuild_queue();
                Err(err)
            }
        }
    }

    /// Rebuild the state as of `t` and leave the traceset at the first
    /// event at or after `t`
    ///
    /// Replays from the closest snapshot with only the state layer active.
    /// Returns the number of events replayed.
    pub fn restore_state_at(&self, ctx: &mut TraceSetContext, t: Timestamp) -> Result<u64> {
        let from = self.seek_time_closest(ctx, t)?;
        let replayed = ctx.process_with(t, None, None, |event| {
            self.observe(event);
            false
        })?;
        info!(target_time = %t, from = %from, replayed, "state restored");
        Ok(replayed)
    }
}

fn restore_closest(
    states: &mut [TraceState],
    ctx: &mut TraceSetContext,
    t: Timestamp,
    start: Timestamp,
) -> Result<Timestamp> {
    let mut earliest = Timestamp::INFINITE;
    for (index, state) in states.iter_mut().enumerate() {
        let saved = state.saved_states().closest_at_or_before(t).cloned();
        let trace = &mut ctx.traces[index];
        match saved {
            Some(saved) => {
                state.check_snapshot(trace, &saved)?;
                for (channel, slot) in trace.channels.iter_mut().zip(&saved.channels) {
                    let handle = channel.handle();
                    channel
                        .seek_cursor(slot.cursor.as_ref())
                        .map_err(|source| TraceError::channel(handle, source))?;
                }
                state.adopt(&saved);
                earliest = earliest.min(saved.timestamp);
                debug!(trace = index, snapshot = %saved.timestamp, "trace restored from snapshot");
            }
            None => {
                for channel in trace.channels.iter_mut() {
                    let handle = channel.handle();
                    channel
                        .seek_time(start)
                        .map_err(|source| TraceError::channel(handle, source))?;
                }
                state.reset();
                earliest = earliest.min(start);
                debug!(trace = index, "trace restored to initial state");
            }
        }
    }
    Ok(earliest)
}

fn state_hook(states: SharedStates, kind: StateEvent) -> Arc<EventHookFn> {
    event_hook(move |ctx| {
        if let Some(state) = states.lock().get_mut(ctx.trace.index()) {
            state.apply(kind, ctx.event, ctx.cpu(), ctx.timestamp());
        }
        false
    })
}
