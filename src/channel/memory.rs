/*!
 * In-Memory Channels
 * Channel adapter over a decoded event vector, and a trace builder around it
 */

use super::{ChannelAdapter, Cursor, Event, EventTypeTable, ReadOutcome, Trace, TraceMetadata};
use crate::core::errors::ChannelError;
use crate::core::name::Name;
use crate::core::types::{Cpu, TimeSpan, Timestamp};
use serde::{Deserialize, Serialize};

const DEFAULT_EVENTS_PER_BLOCK: u64 = 64;

/// Channel backed by a `Vec<Event>`
///
/// Events are grouped into fixed-size blocks so cursors look like the
/// `(block, offset)` pairs a file decoder hands out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ChannelRecord", into = "ChannelRecord")]
pub struct MemoryChannel {
    name: Name,
    cpu: Option<Cpu>,
    events: Vec<Event>,
    events_per_block: u64,
    head: usize,
    corrupt_at: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct ChannelRecord {
    name: Name,
    #[serde(default)]
    cpu: Option<Cpu>,
    events: Vec<Event>,
}

impl From<ChannelRecord> for MemoryChannel {
    fn from(record: ChannelRecord) -> Self {
        let channel = MemoryChannel::new(record.name.as_str(), record.events);
        match record.cpu {
            Some(cpu) => channel.on_cpu(cpu),
            None => channel,
        }
    }
}

impl From<MemoryChannel> for ChannelRecord {
    fn from(channel: MemoryChannel) -> Self {
        ChannelRecord {
            name: channel.name,
            cpu: channel.cpu,
            events: channel.events,
        }
    }
}

impl MemoryChannel {
    /// Build a channel; events are stably sorted by timestamp
    pub fn new(name: &str, mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self {
            name: name.into(),
            cpu: None,
            events,
            events_per_block: DEFAULT_EVENTS_PER_BLOCK,
            head: 0,
            corrupt_at: None,
        }
    }

    #[must_use]
    pub fn on_cpu(mut self, cpu: Cpu) -> Self {
        self.cpu = Some(cpu);
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, events_per_block: u64) -> Self {
        self.events_per_block = events_per_block.max(1);
        self
    }

    /// Make decoding the `index`-th event fail as corrupt data
    #[must_use]
    pub fn with_corruption_at(mut self, index: usize) -> Self {
        self.corrupt_at = Some(index);
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    fn cursor_at(&self, index: usize) -> Option<Cursor> {
        let event = self.events.get(index)?;
        let index = index as u64;
        Some(Cursor::new(
            index / self.events_per_block,
            index % self.events_per_block,
            event.timestamp,
        ))
    }

    fn outcome(&self) -> ReadOutcome {
        if self.head < self.events.len() {
            ReadOutcome::Ready
        } else {
            ReadOutcome::EndOfChannel
        }
    }
}

impl ChannelAdapter for MemoryChannel {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn cpu(&self) -> Option<Cpu> {
        self.cpu
    }

    fn time_span(&self) -> TimeSpan {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => TimeSpan::new(first.timestamp, last.timestamp),
            _ => TimeSpan::default(),
        }
    }

    fn event_count(&self) -> u64 {
        self.events.len() as u64
    }

    fn read_next(&mut self) -> Result<ReadOutcome, ChannelError> {
        if self.head >= self.events.len() {
            return Ok(ReadOutcome::EndOfChannel);
        }
        let next = self.head + 1;
        if self.corrupt_at == Some(next) {
            let index = next as u64;
            return Err(ChannelError::Corrupt {
                block: index / self.events_per_block,
                offset: index % self.events_per_block,
                reason: "event header checksum mismatch".into(),
            });
        }
        self.head = next;
        Ok(self.outcome())
    }

    fn seek_time(&mut self, t: Timestamp) -> Result<ReadOutcome, ChannelError> {
        self.head = self.events.partition_point(|e| e.timestamp < t);
        Ok(self.outcome())
    }

    fn seek_position(&mut self, cursor: &Cursor) -> Result<(), ChannelError> {
        let invalid = ChannelError::InvalidCursor {
            block: cursor.block,
            offset: cursor.offset,
        };
        if cursor.offset >= self.events_per_block {
            return Err(invalid);
        }
        let index = cursor
            .block
            .checked_mul(self.events_per_block)
            .and_then(|base| base.checked_add(cursor.offset))
            .and_then(|index| usize::try_from(index).ok())
            .ok_or_else(|| invalid.clone())?;
        match self.events.get(index) {
            Some(event) if event.timestamp == cursor.timestamp => {
                self.head = index;
                Ok(())
            }
            _ => Err(invalid),
        }
    }

    fn current_event(&self) -> Option<&Event> {
        self.events.get(self.head)
    }

    fn cursor(&self) -> Option<Cursor> {
        self.cursor_at(self.head)
    }
}

/// Trace assembled from in-memory channels
///
/// Deserializes from JSON of the form
/// `{"name": .., "event_types": [..], "metadata": {..}, "channels": [{"name": .., "cpu": .., "events": [..]}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTrace {
    pub name: Name,
    pub event_types: EventTypeTable,
    #[serde(default)]
    pub metadata: TraceMetadata,
    #[serde(default)]
    pub channels: Vec<MemoryChannel>,
}

impl MemoryTrace {
    pub fn new(name: &str, event_types: EventTypeTable) -> Self {
        Self {
            name: name.into(),
            event_types,
            metadata: TraceMetadata::default(),
            channels: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_channel(mut self, channel: MemoryChannel) -> Self {
        self.channels.push(channel);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: TraceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Hand the channels to the engine
    pub fn into_trace(self) -> Trace {
        let mut trace = Trace::new(self.name, self.event_types).with_metadata(self.metadata);
        for channel in self.channels {
            trace = trace.with_channel(channel);
        }
        trace
    }
}

impl From<MemoryTrace> for Trace {
    fn from(trace: MemoryTrace) -> Self {
        trace.into_trace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(times: &[u64]) -> MemoryChannel {
        let events = times
            .iter()
            .map(|t| Event::new(Timestamp::from_nanos(*t), 0, 0))
            .collect();
        MemoryChannel::new("cpu0", events).with_block_size(2)
    }

    #[test]
    fn test_read_to_end() {
        let mut chan = channel(&[1, 2, 3]);
        assert_eq!(chan.current_event().map(|e| e.timestamp.as_nanos()), Some(1));
        assert_eq!(chan.read_next().unwrap(), ReadOutcome::Ready);
        assert_eq!(chan.read_next().unwrap(), ReadOutcome::Ready);
        assert_eq!(chan.read_next().unwrap(), ReadOutcome::EndOfChannel);
        assert!(chan.current_event().is_none());
        assert_eq!(chan.read_next().unwrap(), ReadOutcome::EndOfChannel);
    }

    #[test]
    fn test_cursor_blocks() {
        let mut chan = channel(&[1, 2, 3]);
        chan.read_next().unwrap();
        chan.read_next().unwrap();
        let cursor = chan.cursor().unwrap();
        assert_eq!((cursor.block, cursor.offset), (1, 0));
        chan.seek_time(Timestamp::ZERO).unwrap();
        chan.seek_position(&cursor).unwrap();
        assert_eq!(chan.current_event().map(|e| e.timestamp.as_nanos()), Some(3));
    }

    #[test]
    fn test_seek_time_first_at_or_after() {
        let mut chan = channel(&[10, 20, 20, 30]);
        assert_eq!(chan.seek_time(Timestamp::from_nanos(20)).unwrap(), ReadOutcome::Ready);
        assert_eq!(chan.cursor().map(|c| c.offset), Some(1));
        assert_eq!(
            chan.seek_time(Timestamp::from_nanos(31)).unwrap(),
            ReadOutcome::EndOfChannel
        );
    }

    #[test]
    fn test_stale_cursor_rejected() {
        let mut chan = channel(&[1, 2]);
        let bogus = Cursor::new(0, 1, Timestamp::from_nanos(99));
        assert!(matches!(
            chan.seek_position(&bogus),
            Err(ChannelError::InvalidCursor { .. })
        ));
    }

    #[test]
    fn test_corruption() {
        let mut chan = channel(&[1, 2, 3]).with_corruption_at(2);
        chan.read_next().unwrap();
        assert!(matches!(chan.read_next(), Err(ChannelError::Corrupt { .. })));
    }

    #[test]
    fn test_trace_from_json() {
        let json = r#"{
            "name": "kernel",
            "event_types": ["sched_schedule"],
            "channels": [
                {"name": "cpu0", "cpu": 0, "events": [
                    {"timestamp": 20, "event_type": 0, "cpu": 0, "fields": [["prev_pid", 1]]},
                    {"timestamp": 10, "event_type": 0, "cpu": 0}
                ]}
            ]
        }"#;
        let trace = MemoryTrace::from_json(json).unwrap();
        let chan = &trace.channels[0];
        assert_eq!(chan.cpu(), Some(0));
        assert_eq!(chan.events()[0].timestamp, Timestamp::from_nanos(10));
        assert_eq!(chan.events()[1].field_u64("prev_pid"), Some(1));
    }
}
