/*!
 * Core Types
 * Common types used across the trace engine
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Process ID type
pub type Pid = u32;

/// CPU number type
pub type Cpu = u32;

/// Event type identifier, local to one trace
pub type EventTypeId = u32;

/// Trace timestamp in nanoseconds
///
/// `Timestamp::INFINITE` marks an exhausted channel or an empty position and
/// sorts after every real timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);
    pub const INFINITE: Self = Self(u64::MAX);

    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline(always)]
    #[must_use]
    pub const fn is_infinite(self) -> bool {
        self.0 == u64::MAX
    }

    /// Move back in time, clamping at zero. Infinity stays infinite.
    #[must_use]
    pub fn saturating_sub(self, offset: Duration) -> Self {
        if self.is_infinite() {
            return self;
        }
        Self(self.0.saturating_sub(duration_to_nanos(offset)))
    }

    /// Move forward in time, clamping just below infinity.
    #[must_use]
    pub fn saturating_add(self, offset: Duration) -> Self {
        if self.is_infinite() {
            return self;
        }
        Self(self.0.saturating_add(duration_to_nanos(offset)).min(u64::MAX - 1))
    }

    /// Elapsed time since `earlier`, zero if `earlier` is later.
    #[must_use]
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
        }
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

#[inline]
pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Observed time span of a channel, a trace or a whole traceset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeSpan {
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both
    #[must_use]
    pub fn union(self, other: TimeSpan) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Fold a list of spans; an empty list yields the zero span.
    pub fn covering<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = TimeSpan>,
    {
        spans
            .into_iter()
            .reduce(TimeSpan::union)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t <= self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start)
    }
}

/// Arena address of one channel context: (trace index, channel index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub trace: usize,
    pub channel: usize,
}

impl ChannelHandle {
    #[inline]
    #[must_use]
    pub const fn new(trace: usize, channel: usize) -> Self {
        Self { trace, channel }
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.trace, self.channel)
    }
}
