/*!
 * Trace Context
 */

use super::attributes::Attributes;
use super::channel::ChannelContext;
use crate::channel::{EventTypeTable, Trace, TraceMetadata};
use crate::core::name::Name;
use crate::core::types::{ChannelHandle, TimeSpan};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// One attached trace and its channels
pub struct TraceContext {
    pub(crate) index: usize,
    name: Name,
    pub(crate) channels: Vec<ChannelContext>,
    time_span: TimeSpan,
    event_types: EventTypeTable,
    metadata: TraceMetadata,
    attributes: Attributes,
    in_use: AtomicBool,
}

impl TraceContext {
    pub(crate) fn new(index: usize, trace: Trace) -> Self {
        let event_type_count = trace.event_types.len();
        let channels: Vec<ChannelContext> = trace
            .channels
            .into_iter()
            .enumerate()
            .map(|(channel, adapter)| {
                ChannelContext::new(adapter, ChannelHandle::new(index, channel), event_type_count)
            })
            .collect();
        let time_span = TimeSpan::covering(
            channels
                .iter()
                .filter(|c| c.has_events())
                .map(ChannelContext::time_span),
        );
        Self {
            index,
            name: trace.name,
            channels,
            time_span,
            event_types: trace.event_types,
            metadata: trace.metadata,
            attributes: Attributes::new(),
            in_use: AtomicBool::new(false),
        }
    }

    /// Give the adapters back, in channel order
    pub(crate) fn into_trace(self) -> Trace {
        Trace {
            name: self.name,
            channels: self.channels.into_iter().map(|c| c.adapter).collect(),
            event_types: self.event_types,
            metadata: self.metadata,
        }
    }

    /// Renumber after an earlier trace was detached
    pub(crate) fn reindex(&mut self, index: usize) {
        self.index = index;
        for channel in &mut self.channels {
            channel.handle.trace = index;
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn channels(&self) -> &[ChannelContext] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelContext> {
        self.channels.get(index)
    }

    pub fn has_events(&self) -> bool {
        self.channels.iter().any(ChannelContext::has_events)
    }

    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    pub fn event_types(&self) -> &EventTypeTable {
        &self.event_types
    }

    pub fn metadata(&self) -> &TraceMetadata {
        &self.metadata
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Claim the advisory in-use flag; false if someone else holds it
    pub fn try_acquire(&self) -> bool {
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.in_use.store(false, Ordering::Release);
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("time_span", &self.time_span)
            .finish()
    }
}
