/*!
 * Channel Context
 * Per-channel read head, merge timestamp and installed hooks
 */

use super::attributes::Attributes;
use crate::channel::{ChannelAdapter, Cursor, Event, ReadOutcome};
use crate::core::errors::ChannelError;
use crate::core::name::Name;
use crate::core::types::{ChannelHandle, Cpu, TimeSpan, Timestamp};
use crate::hooks::{EventHookFn, Hooks, HooksById};
use std::fmt;

/// One channel inside a trace context
///
/// `timestamp` mirrors the adapter's current event, or is
/// `Timestamp::INFINITE` once the channel is exhausted. Only the traceset
/// context mutates it, always together with the merge queue entry.
pub struct ChannelContext {
    pub(crate) adapter: Box<dyn ChannelAdapter>,
    pub(crate) timestamp: Timestamp,
    pub(crate) handle: ChannelHandle,
    name: Name,
    cpu: Option<Cpu>,
    time_span: TimeSpan,
    pub(crate) event: Hooks<EventHookFn>,
    pub(crate) event_by_id: HooksById<EventHookFn>,
    attributes: Attributes,
}

impl ChannelContext {
    pub(crate) fn new(
        adapter: Box<dyn ChannelAdapter>,
        handle: ChannelHandle,
        event_types: usize,
    ) -> Self {
        let name = Name::from(adapter.name());
        let cpu = adapter.cpu();
        let time_span = adapter.time_span();
        Self {
            adapter,
            timestamp: Timestamp::INFINITE,
            handle,
            name,
            cpu,
            time_span,
            event: Hooks::new(),
            event_by_id: HooksById::bounded(event_types),
            attributes: Attributes::new(),
        }
    }

    #[inline]
    pub fn handle(&self) -> ChannelHandle {
        self.handle
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.handle.channel
    }

    #[inline]
    pub fn trace_index(&self) -> usize {
        self.handle.trace
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn cpu(&self) -> Option<Cpu> {
        self.cpu
    }

    /// Timestamp of the pending event, `INFINITE` when exhausted
    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.timestamp.is_infinite()
    }

    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    pub fn has_events(&self) -> bool {
        self.adapter.event_count() > 0
    }

    pub fn event_count(&self) -> u64 {
        self.adapter.event_count()
    }

    /// Pending event, `None` when exhausted
    pub fn current_event(&self) -> Option<&Event> {
        if self.is_exhausted() {
            None
        } else {
            self.adapter.current_event()
        }
    }

    /// Cursor of the pending event, `None` when exhausted
    pub fn cursor(&self) -> Option<Cursor> {
        if self.is_exhausted() {
            None
        } else {
            self.adapter.cursor()
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Catch-all event hooks currently installed
    pub fn event_hooks(&self) -> &Hooks<EventHookFn> {
        &self.event
    }

    /// By-id event hooks currently installed
    pub fn event_hooks_by_id(&self) -> &HooksById<EventHookFn> {
        &self.event_by_id
    }

    /// Adopt the adapter's state after a read or seek
    pub(crate) fn sync_timestamp(&mut self, outcome: ReadOutcome) {
        self.timestamp = match outcome {
            ReadOutcome::Ready => self
                .adapter
                .current_event()
                .map_or(Timestamp::INFINITE, |e| e.timestamp),
            ReadOutcome::EndOfChannel => Timestamp::INFINITE,
        };
    }

    pub(crate) fn seek_time(&mut self, t: Timestamp) -> Result<(), ChannelError> {
        let outcome = self.adapter.seek_time(t)?;
        self.sync_timestamp(outcome);
        Ok(())
    }

    pub(crate) fn seek_cursor(&mut self, cursor: Option<&Cursor>) -> Result<(), ChannelError> {
        match cursor {
            Some(cursor) => {
                self.adapter.seek_position(cursor)?;
                self.sync_timestamp(ReadOutcome::Ready);
            }
            None => self.timestamp = Timestamp::INFINITE,
        }
        Ok(())
    }

    pub(crate) fn advance(&mut self) -> Result<(), ChannelError> {
        let outcome = self.adapter.read_next()?;
        self.sync_timestamp(outcome);
        Ok(())
    }

    pub(crate) fn mark_exhausted(&mut self) {
        self.timestamp = Timestamp::INFINITE;
    }
}

impl fmt::Debug for ChannelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("timestamp", &self.timestamp)
            .field("hooks", &self.event.len())
            .finish()
    }
}
