/*!
 * Trace State
 * Process table, name tables and snapshots of one trace
 */

use super::names::{NameTables, StateEventRoutes};
use super::snapshot::{ChannelSnapshot, SavedState, SavedStates};
use super::table::ProcessTable;
use crate::context::TraceContext;
use crate::core::errors::StateError;
use crate::core::types::{Cpu, Timestamp};
use tracing::debug;

/// Reconstructed state of one trace
#[derive(Debug, Clone)]
pub struct TraceState {
    trace: usize,
    pub(super) processes: ProcessTable,
    pub(super) names: NameTables,
    routes: StateEventRoutes,
    cpus: Vec<Cpu>,
    saved: SavedStates,
    events_applied: u64,
    since_save: u64,
    last_seen: Option<Timestamp>,
}

impl TraceState {
    pub(crate) fn new(trace: &TraceContext) -> Self {
        let mut cpus: Vec<Cpu> = trace.channels().iter().filter_map(|c| c.cpu()).collect();
        cpus.sort_unstable();
        cpus.dedup();

        Self {
            trace: trace.index(),
            processes: ProcessTable::with_idle_tasks(&cpus),
            names: NameTables::from_metadata(trace.metadata()),
            routes: StateEventRoutes::resolve(trace.event_types()),
            cpus,
            saved: SavedStates::new(),
            events_applied: 0,
            since_save: 0,
            last_seen: None,
        }
    }

    #[inline]
    pub fn trace_index(&self) -> usize {
        self.trace
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn names(&self) -> &NameTables {
        &self.names
    }

    pub fn routes(&self) -> &StateEventRoutes {
        &self.routes
    }

    /// CPUs of the trace's per-CPU channels
    pub fn cpus(&self) -> &[Cpu] {
        &self.cpus
    }

    pub fn saved_states(&self) -> &SavedStates {
        &self.saved
    }

    /// Events of this trace seen since the initial state
    #[inline]
    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    pub(super) fn replace_saved_states(&mut self, saved: SavedStates) {
        self.saved = saved;
    }

    /// Back to idle tasks only, counters cleared
    pub(super) fn reset(&mut self) {
        self.processes = ProcessTable::with_idle_tasks(&self.cpus);
        self.events_applied = 0;
        self.since_save = 0;
        self.last_seen = None;
    }

    pub(super) fn adopt(&mut self, saved: &SavedState) {
        self.processes = saved.processes.clone();
        self.events_applied = saved.events_applied;
        self.since_save = 0;
        self.last_seen = None;
    }

    /// Count one event of this trace, snapshotting first when due
    ///
    /// Runs before the event's state updates so the snapshot and the
    /// channel cursors, which still point at the event, form one cut.
    /// A due snapshot waits for the first event of a new timestamp, so
    /// every event it covers is strictly earlier than its timestamp.
    pub(super) fn observe(&mut self, trace: &TraceContext, now: Timestamp, interval: u64) {
        let new_timestamp = self.last_seen.map_or(true, |last| now > last);
        if self.since_save >= interval && new_timestamp {
            let saved = self.capture(trace, now);
            if self.saved.push(saved) {
                debug!(
                    trace = self.trace,
                    time = %now,
                    snapshots = self.saved.len(),
                    "state snapshot saved"
                );
            }
            self.since_save = 0;
        }
        self.since_save += 1;
        self.events_applied += 1;
        self.last_seen = Some(now);
    }

    fn capture(&self, trace: &TraceContext, now: Timestamp) -> SavedState {
        let channels = trace
            .channels()
            .iter()
            .map(|channel| ChannelSnapshot {
                cpu: channel.cpu(),
                running: channel
                    .cpu()
                    .and_then(|cpu| self.processes.running_pid(cpu)),
                cursor: channel.cursor(),
            })
            .collect();
        SavedState {
            timestamp: now,
            events_applied: self.events_applied,
            processes: self.processes.clone(),
            channels,
        }
    }

    pub(super) fn check_snapshot(
        &self,
        trace: &TraceContext,
        saved: &SavedState,
    ) -> Result<(), StateError> {
        if saved.channels.len() != trace.channels().len() {
            return Err(StateError::SnapshotMismatch {
                trace: self.trace,
                expected: trace.channels().len(),
                actual: saved.channels.len(),
            });
        }
        Ok(())
    }
}
