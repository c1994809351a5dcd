/*!
 * Hook Sets
 * Everything one analysis layer registers, installed and removed as a unit
 */

use super::by_id::HooksById;
use super::list::Hooks;
use super::{EventHookFn, LifecycleHookFn, Priority};
use crate::core::errors::HookError;
use crate::core::name::Name;
use crate::core::types::EventTypeId;
use std::sync::Arc;

/// By-id hooks restricted to a subset of channels
///
/// `trace: None` matches every trace, `channel: None` every channel of the
/// selected traces. Event type ids are interpreted in the selected trace.
#[derive(Clone, Debug, Default)]
pub struct ChannelHooksById {
    pub trace: Option<usize>,
    pub channel: Option<Name>,
    pub hooks: HooksById<EventHookFn>,
}

impl ChannelHooksById {
    pub fn matches(&self, trace: usize, channel: &str) -> bool {
        self.trace.map_or(true, |t| t == trace)
            && self.channel.as_ref().map_or(true, |c| c.as_str() == channel)
    }
}

/// Hooks of one layer, threaded through traceset, traces and channels by
/// `TraceSetContext::begin` / `end`
#[derive(Clone, Debug, Default)]
pub struct HookSet {
    pub before_traceset: Hooks<LifecycleHookFn>,
    pub after_traceset: Hooks<LifecycleHookFn>,
    pub before_trace: Hooks<LifecycleHookFn>,
    pub after_trace: Hooks<LifecycleHookFn>,
    pub before_channel: Hooks<LifecycleHookFn>,
    pub after_channel: Hooks<LifecycleHookFn>,

    /// Every event of every channel
    pub event: Hooks<EventHookFn>,

    /// Events of one type, in every trace
    pub event_by_id: HooksById<EventHookFn>,

    /// Events of one type on selected traces or channels
    pub channel_event_by_id: Vec<ChannelHooksById>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_event(mut self, hook: Arc<EventHookFn>, priority: Priority) -> Self {
        self.event.add(hook, priority);
        self
    }

    /// Hook events of type `id` in every trace
    pub fn on_event_id(
        mut self,
        id: EventTypeId,
        hook: Arc<EventHookFn>,
        priority: Priority,
    ) -> Result<Self, HookError> {
        self.event_by_id.entry(id)?.add(hook, priority);
        Ok(self)
    }

    /// Hook events of type `id` on the channels matching the selector
    pub fn on_channel_event_id(
        mut self,
        trace: Option<usize>,
        channel: Option<&str>,
        id: EventTypeId,
        hook: Arc<EventHookFn>,
        priority: Priority,
    ) -> Result<Self, HookError> {
        let channel: Option<Name> = channel.map(Into::into);
        let index = match self
            .channel_event_by_id
            .iter()
            .position(|sel| sel.trace == trace && sel.channel == channel)
        {
            Some(index) => index,
            None => {
                self.channel_event_by_id.push(ChannelHooksById {
                    trace,
                    channel,
                    hooks: HooksById::new(),
                });
                self.channel_event_by_id.len() - 1
            }
        };
        self.channel_event_by_id[index]
            .hooks
            .entry(id)?
            .add(hook, priority);
        Ok(self)
    }

    #[must_use]
    pub fn before_traceset(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.before_traceset.add(hook, priority);
        self
    }

    #[must_use]
    pub fn after_traceset(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.after_traceset.add(hook, priority);
        self
    }

    #[must_use]
    pub fn before_trace(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.before_trace.add(hook, priority);
        self
    }

    #[must_use]
    pub fn after_trace(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.after_trace.add(hook, priority);
        self
    }

    #[must_use]
    pub fn before_channel(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.before_channel.add(hook, priority);
        self
    }

    #[must_use]
    pub fn after_channel(mut self, hook: Arc<LifecycleHookFn>, priority: Priority) -> Self {
        self.after_channel.add(hook, priority);
        self
    }

    /// Fold another set into this one
    pub fn merge(&mut self, other: &HookSet) -> Result<(), HookError> {
        self.event_by_id.add_table(&other.event_by_id)?;
        self.before_traceset.add_list(&other.before_traceset);
        self.after_traceset.add_list(&other.after_traceset);
        self.before_trace.add_list(&other.before_trace);
        self.after_trace.add_list(&other.after_trace);
        self.before_channel.add_list(&other.before_channel);
        self.after_channel.add_list(&other.after_channel);
        self.event.add_list(&other.event);
        self.channel_event_by_id
            .extend(other.channel_event_by_id.iter().cloned());
        Ok(())
    }

    /// By-id tables that apply to one channel
    pub(crate) fn by_id_tables_for<'a>(
        &'a self,
        trace: usize,
        channel: &'a str,
    ) -> impl Iterator<Item = &'a HooksById<EventHookFn>> + 'a {
        std::iter::once(&self.event_by_id).chain(
            self.channel_event_by_id
                .iter()
                .filter(move |sel| sel.matches(trace, channel))
                .map(|sel| &sel.hooks),
        )
    }
}
