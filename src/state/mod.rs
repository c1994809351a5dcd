/*!
 * State Reconstruction
 * Per-process execution state rebuilt from the merged event stream
 *
 * Each trace keeps its own process table. Execution stacks never drop
 * below their baseline frame, exited processes leave the table at their
 * next schedule-out, and periodic snapshots let any point in time be
 * restored by replaying from the closest one.
 */

mod handlers;
mod names;
mod snapshot;
mod table;
mod trace;
mod tracker;
mod types;

pub use names::{NameTables, StateEvent, StateEventRoutes, STATE_EVENT_NAMES};
pub use snapshot::{ChannelSnapshot, SavedState, SavedStates, SNAPSHOT_FORMAT_VERSION};
pub use table::ProcessTable;
pub use trace::TraceState;
pub use tracker::StateTracker;
pub use types::{
    ExecutionMode, ExecutionState, PopRejected, Process, ProcessIdentity, ProcessKey,
    ProcessStatus, ProcessType, SUBMODE_NONE, UNNAMED,
};
