/*!
 * Channel Adapter
 * Boundary to the per-channel event decoder
 *
 * A channel is one forward-only, seekable stream of decoded events. The engine
 * never decodes trace files itself; it drives adapters through this trait.
 */

mod event;
mod memory;

pub use event::{Event, EventTypeTable, FieldValue, TraceMetadata};
pub use memory::{MemoryChannel, MemoryTrace};

use crate::core::errors::ChannelError;
use crate::core::name::Name;
use crate::core::types::{Cpu, TimeSpan, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of one event inside its channel
///
/// Cursors order by `(block, offset)`, which is the channel's read order.
/// They are only meaningful on the channel that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub block: u64,
    pub offset: u64,
    pub timestamp: Timestamp,
}

impl Cursor {
    #[inline]
    #[must_use]
    pub const fn new(block: u64, offset: u64, timestamp: Timestamp) -> Self {
        Self {
            block,
            offset,
            timestamp,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}@{}", self.block, self.offset, self.timestamp)
    }
}

/// Result of advancing or seeking a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The adapter now holds a current event
    Ready,
    /// No event at or after the requested point
    EndOfChannel,
}

/// Forward-reading, seekable decoded event stream
pub trait ChannelAdapter: Send {
    /// Channel name, e.g. `"cpu0"`
    fn name(&self) -> &str;

    /// CPU this channel was recorded on, `None` for control channels
    fn cpu(&self) -> Option<Cpu>;

    /// Timestamps of the first and last events
    fn time_span(&self) -> TimeSpan;

    /// Total number of events in the channel
    fn event_count(&self) -> u64;

    /// Decode the event after the current one
    fn read_next(&mut self) -> Result<ReadOutcome, ChannelError>;

    /// Position on the first event with timestamp `>= t`
    fn seek_time(&mut self, t: Timestamp) -> Result<ReadOutcome, ChannelError>;

    /// Position exactly on the event addressed by `cursor`
    fn seek_position(&mut self, cursor: &Cursor) -> Result<(), ChannelError>;

    /// Event under the read head, `None` once the channel is exhausted
    fn current_event(&self) -> Option<&Event>;

    /// Cursor of the current event
    fn cursor(&self) -> Option<Cursor>;
}

/// One recorded trace handed to the engine
///
/// Channels keep the order given here; that order is the channel index used
/// for merge tie-breaks and position slots.
pub struct Trace {
    pub name: Name,
    pub channels: Vec<Box<dyn ChannelAdapter>>,
    pub event_types: EventTypeTable,
    pub metadata: TraceMetadata,
}

impl Trace {
    pub fn new(name: impl Into<Name>, event_types: EventTypeTable) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
            event_types,
            metadata: TraceMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl ChannelAdapter + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: TraceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("name", &self.name)
            .field(
                "channels",
                &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("event_types", &self.event_types.len())
            .finish()
    }
}
