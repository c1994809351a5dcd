/*!
 * Merge Processing
 * Pop the earliest pending channel, dispatch its event, advance, reinsert
 */

use super::entry::MergeKey;
use crate::context::{EventContext, TraceSetContext};
use crate::core::errors::{Result, TraceError};
use crate::core::types::{ChannelHandle, Timestamp};
use crate::monitoring::RunSpan;
use crate::position::Position;
use std::cmp::Ordering;
use tracing::{error, trace, warn};

/// Where dispatched events go
pub(crate) enum Dispatch<'h> {
    /// Hooks installed through `begin`
    Installed,
    /// A single hook; installed hooks stay silent
    Only(&'h (dyn Fn(&EventContext<'_>) -> bool + 'h)),
}

impl TraceSetContext {
    /// Dispatch events in merge order through the installed hooks
    ///
    /// Stops before the first event at or after `end`, after `max_events`
    /// events, once the traceset reaches `end_position`, when every channel
    /// is exhausted, or right after an event whose hooks returned `true`.
    /// Returns the number of events dispatched.
    ///
    /// A channel that fails to decode is retired and the run aborts with
    /// [`TraceError::Channel`]; resume from a saved position.
    pub fn process_until(
        &mut self,
        end: Timestamp,
        max_events: Option<u64>,
        end_position: Option<&Position>,
    ) -> Result<u64> {
        self.run(end, max_events, end_position, Dispatch::Installed, "process_until")
    }

    /// Same stopping rules as [`process_until`](Self::process_until), but
    /// events reach only `hook`
    pub fn process_with<H>(
        &mut self,
        end: Timestamp,
        max_events: Option<u64>,
        end_position: Option<&Position>,
        hook: H,
    ) -> Result<u64>
    where
        H: Fn(&EventContext<'_>) -> bool,
    {
        self.run(end, max_events, end_position, Dispatch::Only(&hook), "process_with")
    }

    pub(crate) fn run(
        &mut self,
        end: Timestamp,
        max_events: Option<u64>,
        end_position: Option<&Position>,
        dispatch: Dispatch<'_>,
        operation: &'static str,
    ) -> Result<u64> {
        if let Some(position) = end_position {
            self.check_roster(position)?;
        }

        let mut span = RunSpan::new(operation);
        let mut count = 0u64;
        let mut stop = false;

        while !stop {
            if max_events.is_some_and(|max| count >= max) {
                break;
            }
            let Some(key) = self.queue.first().copied() else {
                break;
            };
            if key.timestamp >= end {
                break;
            }
            if let Some(position) = end_position {
                if self.compare_position(position)? != Ordering::Less {
                    break;
                }
            }

            self.queue.pop_first();
            stop = self.dispatch(key, &dispatch);
            count += 1;
            self.advance_channel(key.handle())?;
        }

        span.record_events(count);
        trace!(operation, count, stop, "run finished");
        Ok(count)
    }

    fn dispatch(&self, key: MergeKey, dispatch: &Dispatch<'_>) -> bool {
        let handle = key.handle();
        let Some(trace) = self.traces.get(handle.trace) else {
            warn!(channel = %handle, "queued channel has no trace");
            return false;
        };
        let Some(channel) = trace.channels.get(handle.channel) else {
            warn!(channel = %handle, "queued channel does not exist");
            return false;
        };
        let Some(event) = channel.adapter.current_event() else {
            warn!(channel = %handle, "queued channel has no current event");
            return false;
        };

        let ctx = EventContext {
            traceset: self,
            trace,
            channel,
            event,
        };
        match dispatch {
            Dispatch::Installed => channel
                .event
                .call_merge(channel.event_by_id.get(event.event_type), &ctx),
            Dispatch::Only(hook) => hook(&ctx),
        }
    }

    /// Read the channel's next event and requeue it, or retire it
    fn advance_channel(&mut self, handle: ChannelHandle) -> Result<()> {
        let Some(channel) = self
            .traces
            .get_mut(handle.trace)
            .and_then(|t| t.channels.get_mut(handle.channel))
        else {
            return Ok(());
        };

        match channel.advance() {
            Ok(()) => {
                let timestamp = channel.timestamp();
                if !timestamp.is_infinite() {
                    self.queue.insert(timestamp, handle);
                }
                Ok(())
            }
            Err(source) => {
                channel.mark_exhausted();
                error!(
                    channel = %handle,
                    name = channel.name(),
                    error = %source,
                    "channel decode failed, aborting run"
                );
                Err(TraceError::channel(handle, source))
            }
        }
    }
}
