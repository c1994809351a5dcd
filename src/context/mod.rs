/*!
 * Context Hierarchy
 * TraceSet, trace and channel contexts owning adapters, hooks and attributes
 *
 * Contexts live in plain `Vec` arenas and are addressed by
 * [`ChannelHandle`]s; nothing outside the traceset holds references into
 * them between calls.
 */

mod attributes;
mod channel;
mod trace;

pub use attributes::Attributes;
pub use channel::ChannelContext;
pub use trace::TraceContext;

use crate::channel::{Event, Trace};
use crate::core::config::EngineConfig;
use crate::core::errors::{ContextError, HookError, Result, TraceError};
use crate::core::name::Name;
use crate::core::types::{ChannelHandle, Cpu, TimeSpan, Timestamp};
use crate::hooks::HookSet;
use crate::scheduler::MergeQueue;
use std::fmt;
use tracing::{debug, info};

/// Root of the context hierarchy
///
/// Owns every trace, the merge queue and the traceset-wide time span. The
/// roster generation changes whenever a trace is added or removed, which
/// invalidates all positions taken before.
pub struct TraceSetContext {
    pub(crate) traces: Vec<TraceContext>,
    pub(crate) queue: MergeQueue,
    time_span: TimeSpan,
    attributes: Attributes,
    roster: u64,
    installed: usize,
    config: EngineConfig,
}

impl TraceSetContext {
    /// Attach `traces` and position every channel at the traceset start
    pub fn new(traces: Vec<Trace>) -> Result<Self> {
        Self::with_config(traces, EngineConfig::default())
    }

    pub fn with_config(traces: Vec<Trace>, config: EngineConfig) -> Result<Self> {
        let traces: Vec<TraceContext> = traces
            .into_iter()
            .enumerate()
            .map(|(index, trace)| TraceContext::new(index, trace))
            .collect();

        let mut ctx = Self {
            traces,
            queue: MergeQueue::new(),
            time_span: TimeSpan::default(),
            attributes: Attributes::new(),
            roster: 0,
            installed: 0,
            config,
        };
        ctx.recompute_time_span();
        ctx.seek_time(ctx.time_span.start)?;

        info!(
            traces = ctx.traces.len(),
            channels = ctx.channel_count(),
            start = %ctx.time_span.start,
            end = %ctx.time_span.end,
            "traceset context initialized"
        );
        Ok(ctx)
    }

    pub fn traces(&self) -> &[TraceContext] {
        &self.traces
    }

    pub fn trace(&self, index: usize) -> Option<&TraceContext> {
        self.traces.get(index)
    }

    pub fn channel(&self, handle: ChannelHandle) -> Option<&ChannelContext> {
        self.traces.get(handle.trace)?.channels.get(handle.channel)
    }

    /// Channels in roster order: trace index, then channel index
    pub fn channels(&self) -> impl Iterator<Item = &ChannelContext> + '_ {
        self.traces.iter().flat_map(|t| t.channels.iter())
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut ChannelContext> + '_ {
        self.traces.iter_mut().flat_map(|t| t.channels.iter_mut())
    }

    pub fn channel_count(&self) -> usize {
        self.traces.iter().map(|t| t.channels.len()).sum()
    }

    /// Earliest start and latest end over all traces
    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Generation of the trace roster
    pub fn roster(&self) -> u64 {
        self.roster
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of hook sets between `begin` and `end`
    pub fn hooks_installed(&self) -> usize {
        self.installed
    }

    /// Channels with a pending event
    pub fn pending_channels(&self) -> usize {
        self.queue.len()
    }

    /// Timestamp of the next event the scheduler would dispatch
    pub fn next_timestamp(&self) -> Timestamp {
        self.queue
            .first()
            .map_or(Timestamp::INFINITE, |key| key.timestamp)
    }

    fn recompute_time_span(&mut self) {
        self.time_span = TimeSpan::covering(
            self.traces
                .iter()
                .filter(|t| t.has_events())
                .map(TraceContext::time_span),
        );
    }

    /// Make the queue hold exactly the non-exhausted channels
    pub(crate) fn rebuild_queue(&mut self) {
        let mut queue = MergeQueue::new();
        for channel in self.channels() {
            if !channel.is_exhausted() {
                queue.insert(channel.timestamp(), channel.handle());
            }
        }
        self.queue = queue;
    }

    fn check_selectors(&self, hooks: &HookSet) -> std::result::Result<(), HookError> {
        if let Some(sel) = hooks
            .channel_event_by_id
            .iter()
            .find(|sel| sel.trace.is_some_and(|t| t >= self.traces.len()))
        {
            return Err(HookError::TraceOutOfRange(sel.trace.unwrap_or_default()));
        }
        for trace in &self.traces {
            for channel in &trace.channels {
                for table in hooks.by_id_tables_for(trace.index, channel.name()) {
                    if let Some(id) = table
                        .ids()
                        .find(|id| !trace.event_types().contains(*id))
                    {
                        return Err(HookError::UnknownEventType {
                            id,
                            trace: trace.index,
                            known: trace.event_types().len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Install a hook set
    ///
    /// Calls traceset-before, then for each trace trace-before followed by
    /// channel-before and event hook installation for each of its channels.
    /// Unknown event type ids fail the call before any hook runs.
    pub fn begin(&mut self, hooks: &HookSet) -> Result<()> {
        self.check_selectors(hooks)?;

        hooks.before_traceset.call(&LifecycleContext::TraceSet(self));
        for t in 0..self.traces.len() {
            hooks.before_trace.call(&LifecycleContext::Trace {
                traceset: self,
                trace: &self.traces[t],
            });
            for c in 0..self.traces[t].channels.len() {
                let trace = &self.traces[t];
                hooks.before_channel.call(&LifecycleContext::Channel {
                    traceset: self,
                    trace,
                    channel: &trace.channels[c],
                });

                let channel = &mut self.traces[t].channels[c];
                let name = Name::from(channel.name());
                channel.event.add_list(&hooks.event);
                for table in hooks.by_id_tables_for(t, name.as_str()) {
                    channel
                        .event_by_id
                        .add_table(table)
                        .map_err(|err| with_trace(err, t))?;
                }
            }
        }

        self.installed += 1;
        debug!(installed = self.installed, "hook set installed");
        Ok(())
    }

    /// Remove a hook set installed by [`begin`](Self::begin)
    ///
    /// Mirrors `begin`: per trace, each channel's hooks are removed and
    /// channel-after runs, then trace-after; traceset-after runs last.
    pub fn end(&mut self, hooks: &HookSet) -> Result<()> {
        if self.installed == 0 {
            return Err(ContextError::NotInstalled.into());
        }

        for t in 0..self.traces.len() {
            for c in 0..self.traces[t].channels.len() {
                let channel = &mut self.traces[t].channels[c];
                let name = Name::from(channel.name());
                channel.event.remove_list(&hooks.event);
                for table in hooks.by_id_tables_for(t, name.as_str()) {
                    channel.event_by_id.remove_table(table);
                }

                let trace = &self.traces[t];
                hooks.after_channel.call(&LifecycleContext::Channel {
                    traceset: self,
                    trace,
                    channel: &trace.channels[c],
                });
            }
            hooks.after_trace.call(&LifecycleContext::Trace {
                traceset: self,
                trace: &self.traces[t],
            });
        }
        hooks.after_traceset.call(&LifecycleContext::TraceSet(self));

        self.installed -= 1;
        debug!(installed = self.installed, "hook set removed");
        Ok(())
    }

    fn check_roster_change(&self) -> Result<()> {
        if self.installed > 0 {
            return Err(ContextError::HooksInstalled(self.installed).into());
        }
        Ok(())
    }

    /// Attach another trace and restart processing at the traceset start
    ///
    /// Returns the new trace's index. Outstanding positions become invalid.
    pub fn add_trace(&mut self, trace: Trace) -> Result<usize> {
        self.check_roster_change()?;
        let index = self.traces.len();
        self.traces.push(TraceContext::new(index, trace));
        self.roster += 1;
        self.recompute_time_span();
        self.seek_time(self.time_span.start)?;
        info!(trace = index, roster = self.roster, "trace attached");
        Ok(index)
    }

    /// Detach a trace, handing its channels back
    ///
    /// Remaining traces keep their read positions and are renumbered.
    /// Outstanding positions become invalid.
    pub fn remove_trace(&mut self, index: usize) -> Result<Trace> {
        self.check_roster_change()?;
        if index >= self.traces.len() {
            return Err(ContextError::TraceNotFound(index).into());
        }
        let removed = self.traces.remove(index);
        for (i, trace) in self.traces.iter_mut().enumerate().skip(index) {
            trace.reindex(i);
        }
        self.roster += 1;
        self.recompute_time_span();
        self.rebuild_queue();
        info!(trace = index, roster = self.roster, "trace detached");
        Ok(removed.into_trace())
    }
}

fn with_trace(err: HookError, trace: usize) -> TraceError {
    match err {
        HookError::UnknownEventType { id, known, .. } => {
            HookError::UnknownEventType { id, trace, known }.into()
        }
        other => other.into(),
    }
}

impl fmt::Debug for TraceSetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSetContext")
            .field("traces", &self.traces)
            .field("pending", &self.queue.len())
            .field("time_span", &self.time_span)
            .field("roster", &self.roster)
            .field("installed", &self.installed)
            .finish()
    }
}

/// Everything a per-event hook can see
///
/// The channel's read head still sits on `event` while hooks run.
#[derive(Clone, Copy)]
pub struct EventContext<'a> {
    pub traceset: &'a TraceSetContext,
    pub trace: &'a TraceContext,
    pub channel: &'a ChannelContext,
    pub event: &'a Event,
}

impl<'a> EventContext<'a> {
    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.event.timestamp
    }

    #[inline]
    pub fn handle(&self) -> ChannelHandle {
        self.channel.handle()
    }

    /// CPU of the channel, falling back to the CPU recorded in the event
    #[inline]
    pub fn cpu(&self) -> Cpu {
        self.channel.cpu().unwrap_or(self.event.cpu)
    }

    pub fn event_name(&self) -> Option<&'a str> {
        self.trace
            .event_types()
            .name_of(self.event.event_type)
            .map(Name::as_str)
    }
}

impl fmt::Debug for EventContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("handle", &self.handle())
            .field("event", self.event)
            .finish()
    }
}

/// Level a lifecycle hook is called at
#[derive(Clone, Copy)]
pub enum LifecycleContext<'a> {
    TraceSet(&'a TraceSetContext),
    Trace {
        traceset: &'a TraceSetContext,
        trace: &'a TraceContext,
    },
    Channel {
        traceset: &'a TraceSetContext,
        trace: &'a TraceContext,
        channel: &'a ChannelContext,
    },
}

impl<'a> LifecycleContext<'a> {
    pub fn traceset(&self) -> &'a TraceSetContext {
        match *self {
            LifecycleContext::TraceSet(traceset)
            | LifecycleContext::Trace { traceset, .. }
            | LifecycleContext::Channel { traceset, .. } => traceset,
        }
    }

    pub fn trace(&self) -> Option<&'a TraceContext> {
        match *self {
            LifecycleContext::TraceSet(_) => None,
            LifecycleContext::Trace { trace, .. } | LifecycleContext::Channel { trace, .. } => {
                Some(trace)
            }
        }
    }

    pub fn channel(&self) -> Option<&'a ChannelContext> {
        match *self {
            LifecycleContext::Channel { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Debug for LifecycleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleContext::TraceSet(_) => f.write_str("TraceSet"),
            LifecycleContext::Trace { trace, .. } => write!(f, "Trace({})", trace.index()),
            LifecycleContext::Channel { channel, .. } => write!(f, "Channel({})", channel.handle()),
        }
    }
}
