/*!
 * Trace Merge Engine
 * Multi-channel kernel trace merging, checkpointing and process state
 */

pub mod channel;
pub mod computation;
pub mod context;
pub mod core;
pub mod hooks;
pub mod monitoring;
pub mod position;
pub mod scheduler;
pub mod state;

// Re-exports
pub use channel::{
    ChannelAdapter, Cursor, Event, EventTypeTable, FieldValue, MemoryChannel, MemoryTrace,
    ReadOutcome, Trace, TraceMetadata,
};
pub use computation::{ComputationRegistry, Progress};
pub use context::{ChannelContext, EventContext, LifecycleContext, TraceContext, TraceSetContext};
pub use self::core::{
    ChannelError, ChannelHandle, ConfigError, ContextError, Cpu, EngineConfig, EventTypeId,
    HookError, Name, Pid, PositionError, Result, StateError, TimeSpan, Timestamp, TraceError,
};
pub use hooks::{
    event_hook, lifecycle_hook, HookSet, Hooks, HooksById, Priority, PRIORITY_DEFAULT,
    PRIORITY_HIGH, PRIORITY_STATE,
};
pub use monitoring::init_tracing;
pub use position::{Position, SeekOptions};
pub use state::{ExecutionMode, Process, ProcessStatus, SavedStates, StateTracker};
