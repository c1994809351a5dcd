/*!
 * Relative Seeks
 * Jump N qualifying events forward or backward
 *
 * Channels only read forward, so a backward seek replays a window before
 * the current point and keeps the last N qualifying positions. The window
 * grows geometrically until it holds N events or covers the traceset start.
 */

use super::Position;
use crate::context::{EventContext, TraceSetContext};
use crate::core::errors::Result;
use crate::core::types::Timestamp;
use crate::scheduler::Dispatch;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Event filter consumed by relative seeks
pub type EventPredicate = dyn Fn(&EventContext<'_>) -> bool + Send + Sync;

/// Filter and cancellation for relative seeks
#[derive(Clone, Default)]
pub struct SeekOptions {
    /// Only events matching the filter are counted
    pub filter: Option<Arc<EventPredicate>>,
    /// Setting the flag stops the seek at the next event boundary
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl SeekOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter<P>(mut self, filter: P) -> Self
    where
        P: Fn(&EventContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    #[inline]
    fn qualifies(&self, ctx: &EventContext<'_>) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(ctx))
    }

    #[inline]
    fn cancelled(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl fmt::Debug for SeekOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekOptions")
            .field("filter", &self.filter.is_some())
            .field("stop_flag", &self.stop_flag.is_some())
            .finish()
    }
}

const RING_PREALLOC: usize = 1024;

/// Last `capacity` positions seen, oldest first
struct PositionRing {
    positions: VecDeque<Position>,
    capacity: usize,
}

impl PositionRing {
    fn new(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity.min(RING_PREALLOC)),
            capacity,
        }
    }

    fn push(&mut self, position: Position) {
        if self.positions.len() == self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    fn oldest(&self) -> Option<&Position> {
        self.positions.front()
    }
}

impl TraceSetContext {
    /// Move forward past `n` qualifying events
    ///
    /// Installed hooks do not run. Returns the number of qualifying events
    /// passed, lower than `n` only at the end of the traceset or when the
    /// stop flag was raised.
    pub fn seek_n_forward(&mut self, n: u64, options: &SeekOptions) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        let found = Cell::new(0u64);
        let hook = |ctx: &EventContext<'_>| {
            if options.cancelled() {
                return true;
            }
            if !options.qualifies(ctx) {
                return false;
            }
            found.set(found.get() + 1);
            found.get() >= n
        };
        self.run(Timestamp::INFINITE, None, None, Dispatch::Only(&hook), "seek_n_forward")?;

        debug!(requested = n, found = found.get(), "seeked forward");
        Ok(found.get())
    }

    /// Move back before the `n`-th qualifying event preceding the current
    /// position
    ///
    /// `time_seeker` repositions the traceset at a time; pass
    /// `|ctx, t| ctx.seek_time(t)` or a state-aware seek. The first window
    /// spans `first_offset` (the configured default when zero) and grows by
    /// the configured multiplier per retry. When fewer than `n` events exist
    /// the traceset lands on the oldest one found, or stays put if none was.
    /// Installed hooks do not run. Returns the number of events found.
    pub fn seek_n_backward<S>(
        &mut self,
        n: u64,
        first_offset: Duration,
        mut time_seeker: S,
        options: &SeekOptions,
    ) -> Result<u64>
    where
        S: FnMut(&mut TraceSetContext, Timestamp) -> Result<()>,
    {
        if n == 0 || self.traces().is_empty() {
            return Ok(0);
        }

        let start = self.time_span().start;
        let multiplier = self.config().backward_seek_multiplier.max(2);
        let mut offset = if first_offset.is_zero() {
            self.config().default_seek_offset
        } else {
            first_offset
        };

        let origin = self.save_position();
        let mut next_end = origin.clone();
        let mut fallback = origin.clone();
        let mut time = origin.timestamp().min(self.time_span().end);

        let ring = RefCell::new(PositionRing::new(usize::try_from(n).unwrap_or(usize::MAX)));
        let found = Cell::new(0u64);
        let cancelled = Cell::new(false);
        let hook = |ctx: &EventContext<'_>| {
            if options.cancelled() {
                cancelled.set(true);
                return true;
            }
            if !options.qualifies(ctx) {
                return false;
            }
            ring.borrow_mut().push(ctx.traceset.save_position());
            found.set((found.get() + 1).min(n));
            false
        };

        let mut windows = 0u32;
        loop {
            let end = next_end.clone();
            time = time.saturating_sub(offset);
            let window_start = time;
            windows += 1;

            time_seeker(self, time)?;
            next_end = self.save_position();
            time = next_end.timestamp().min(self.time_span().end);

            self.run(
                Timestamp::INFINITE,
                None,
                Some(&end),
                Dispatch::Only(&hook),
                "seek_n_backward",
            )?;

            if cancelled.get() {
                self.restore_position(&origin)?;
                debug!(requested = n, windows, "backward seek cancelled");
                return Ok(0);
            }
            if found.get() >= n {
                break;
            }

            {
                let mut kept = ring.borrow_mut();
                if let Some(oldest) = kept.oldest() {
                    fallback = oldest.clone();
                }
                let missing = usize::try_from(n - found.get()).unwrap_or(usize::MAX);
                *kept = PositionRing::new(missing);
            }

            if window_start <= start {
                break;
            }
            offset = offset.saturating_mul(multiplier);
        }

        let target = if found.get() >= n {
            ring.borrow().oldest().cloned().unwrap_or(fallback)
        } else {
            fallback
        };
        self.restore_position(&target)?;

        debug!(
            requested = n,
            found = found.get(),
            windows,
            landed = %target.timestamp(),
            "seeked backward"
        );
        Ok(found.get())
    }
}
