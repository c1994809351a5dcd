/*!
 * Merge Queue Entries
 * Ordered keys of pending channels
 */

use crate::core::types::{ChannelHandle, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Merge order of one pending channel
///
/// Field order gives the derived ordering: timestamp, then trace index,
/// then channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MergeKey {
    pub timestamp: Timestamp,
    pub trace: usize,
    pub channel: usize,
}

impl MergeKey {
    #[inline]
    pub fn new(timestamp: Timestamp, handle: ChannelHandle) -> Self {
        Self {
            timestamp,
            trace: handle.trace,
            channel: handle.channel,
        }
    }

    #[inline]
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle::new(self.trace, self.channel)
    }
}

/// Pending channels ordered by [`MergeKey`]
///
/// Holds at most one key per channel, and that key carries the channel's
/// current timestamp.
#[derive(Debug, Default, Clone)]
pub struct MergeQueue {
    keys: BTreeSet<MergeKey>,
}

impl MergeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending channel; exhausted channels are refused
    pub fn insert(&mut self, timestamp: Timestamp, handle: ChannelHandle) -> bool {
        if timestamp.is_infinite() {
            warn!(channel = %handle, "refusing to queue an exhausted channel");
            return false;
        }
        self.keys.insert(MergeKey::new(timestamp, handle))
    }

    pub fn remove(&mut self, timestamp: Timestamp, handle: ChannelHandle) -> bool {
        self.keys.remove(&MergeKey::new(timestamp, handle))
    }

    #[inline]
    pub fn first(&self) -> Option<&MergeKey> {
        self.keys.first()
    }

    #[inline]
    pub fn pop_first(&mut self) -> Option<MergeKey> {
        self.keys.pop_first()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, handle: ChannelHandle) -> bool {
        self.keys.iter().any(|k| k.handle() == handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergeKey> + '_ {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: u64) -> Timestamp {
        Timestamp::from_nanos(n)
    }

    #[test]
    fn test_tie_break_by_trace_then_channel() {
        let mut queue = MergeQueue::new();
        queue.insert(ts(10), ChannelHandle::new(1, 0));
        queue.insert(ts(10), ChannelHandle::new(0, 1));
        queue.insert(ts(5), ChannelHandle::new(1, 1));
        queue.insert(ts(10), ChannelHandle::new(0, 0));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_first())
            .map(|k| (k.timestamp.as_nanos(), k.trace, k.channel))
            .collect();
        assert_eq!(order, vec![(5, 1, 1), (10, 0, 0), (10, 0, 1), (10, 1, 0)]);
    }

    #[test]
    fn test_exhausted_not_queued() {
        let mut queue = MergeQueue::new();
        assert!(!queue.insert(Timestamp::INFINITE, ChannelHandle::new(0, 0)));
        assert!(queue.is_empty());
    }
}
