/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::name::Name;
use crate::core::types::{ChannelHandle, EventTypeId};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a channel adapter
///
/// End-of-channel is not an error; adapters report it through
/// [`ReadOutcome::EndOfChannel`](crate::channel::ReadOutcome).
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ChannelError {
    #[error("I/O failure on channel: {0}")]
    #[diagnostic(
        code(channel::io),
        help("The channel file could not be read. Retry from the last good checkpoint.")
    )]
    Io(Name),

    #[error("Corrupt event at block {block}, offset {offset}: {reason}")]
    #[diagnostic(
        code(channel::corrupt),
        help("Trace data is damaged. Events past this point cannot be trusted.")
    )]
    Corrupt { block: u64, offset: u64, reason: Name },

    #[error("Seek failed: {0}")]
    #[diagnostic(code(channel::seek_failed), help("The requested location is not addressable."))]
    SeekFailed(Name),

    #[error("Cursor block {block}, offset {offset} does not address an event")]
    #[diagnostic(
        code(channel::invalid_cursor),
        help("Cursors are only valid on the channel that produced them.")
    )]
    InvalidCursor { block: u64, offset: u64 },
}

/// Hook registration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum HookError {
    #[error("Event type {id} is not defined by trace {trace} ({known} types known)")]
    #[diagnostic(
        code(hooks::unknown_event_type),
        help("Resolve event type ids through the trace's event type table before registering.")
    )]
    UnknownEventType { id: EventTypeId, trace: usize, known: usize },

    #[error("Trace selector {0} is out of range")]
    #[diagnostic(code(hooks::trace_out_of_range), help("Check the trace index against the traceset."))]
    TraceOutOfRange(usize),
}

/// Checkpoint misuse
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PositionError {
    #[error(
        "Position taken against roster {expected_roster} ({expected_slots} channels), \
         traceset is at roster {actual_roster} ({actual_slots} channels)"
    )]
    #[diagnostic(
        code(position::roster_mismatch),
        help("Adding or removing a trace invalidates every saved position. Save a new one.")
    )]
    RosterMismatch {
        expected_roster: u64,
        actual_roster: u64,
        expected_slots: usize,
        actual_slots: usize,
    },
}

/// Context hierarchy misuse
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ContextError {
    #[error("Roster change refused: {0} hook set(s) still installed")]
    #[diagnostic(
        code(context::hooks_installed),
        help("Call end() for every begin() before adding or removing traces.")
    )]
    HooksInstalled(usize),

    #[error("Trace {0} not found")]
    #[diagnostic(code(context::trace_not_found), help("Trace indices are dense and zero-based."))]
    TraceNotFound(usize),

    #[error("end() called without a matching begin()")]
    #[diagnostic(code(context::not_installed), help("Balance begin() and end() calls."))]
    NotInstalled,

    #[error("Trace {0} is in use by another computation")]
    #[diagnostic(
        code(context::trace_in_use),
        help("Wait for the running computation to finish or cancel it.")
    )]
    TraceInUse(usize),

    #[error("Computation {0} is already registered")]
    #[diagnostic(code(context::duplicate_computation))]
    DuplicateComputation(Name),

    #[error("Computation {0} is not registered")]
    #[diagnostic(code(context::unknown_computation))]
    UnknownComputation(Name),
}

/// State layer errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StateError {
    #[error("Snapshot archive version {found} is not supported (expected {expected})")]
    #[diagnostic(code(state::invalid_version), help("Regenerate the archive with this build."))]
    InvalidVersion { found: u32, expected: u32 },

    #[error("Snapshot archive encoding failed: {0}")]
    #[diagnostic(code(state::serialization))]
    Serialization(Name),

    #[error("Snapshot archive I/O failed: {0}")]
    #[diagnostic(code(state::io))]
    Io(Name),

    #[error("Trace {0} is not tracked by this state tracker")]
    #[diagnostic(
        code(state::trace_not_tracked),
        help("Create the tracker after all traces are attached.")
    )]
    TraceNotTracked(usize),

    #[error("Traceset roster changed from generation {expected} to {actual}")]
    #[diagnostic(
        code(state::roster_changed),
        help("Create a new state tracker after adding or removing traces.")
    )]
    RosterChanged { expected: u64, actual: u64 },

    #[error("Snapshot of trace {trace} has {actual} channels, trace has {expected}")]
    #[diagnostic(code(state::snapshot_mismatch))]
    SnapshotMismatch {
        trace: usize,
        expected: usize,
        actual: usize,
    },
}

impl From<bincode::Error> for StateError {
    fn from(err: bincode::Error) -> Self {
        StateError::Serialization(err.to_string().into())
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io(err.to_string().into())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    #[diagnostic(code(config::invalid), help("Expected a positive integer."))]
    Invalid { key: Name, value: Name },
}

/// Unified engine error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum TraceError {
    #[error("Channel {handle} failed: {source}")]
    #[diagnostic(code(trace::channel))]
    Channel {
        handle: ChannelHandle,
        #[source]
        source: ChannelError,
    },

    #[error("Hook error: {0}")]
    #[diagnostic(transparent)]
    Hook(#[from] HookError),

    #[error("Position error: {0}")]
    #[diagnostic(transparent)]
    Position(#[from] PositionError),

    #[error("Context error: {0}")]
    #[diagnostic(transparent)]
    Context(#[from] ContextError),

    #[error("State error: {0}")]
    #[diagnostic(transparent)]
    State(#[from] StateError),

    #[error("Config error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl TraceError {
    #[inline]
    pub fn channel(handle: ChannelHandle, source: ChannelError) -> Self {
        TraceError::Channel { handle, source }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, TraceError>;
