/*!
 * Saved States
 * Periodic deep copies of a trace's process state, searchable by time
 */

use super::table::ProcessTable;
use crate::channel::Cursor;
use crate::core::errors::StateError;
use crate::core::types::{Cpu, Pid, Timestamp};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, info};

/// Archive format version written ahead of the bincode payload
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Read head and running pid of one channel when a snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub cpu: Option<Cpu>,
    /// Pid running on the channel's CPU
    pub running: Option<Pid>,
    /// `None` when the channel had no pending event
    pub cursor: Option<Cursor>,
}

/// State of one trace just before the event at `timestamp` was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    pub timestamp: Timestamp,
    /// Events of this trace applied before the snapshot
    pub events_applied: u64,
    pub processes: ProcessTable,
    /// One entry per channel of the trace, in channel order
    pub channels: Vec<ChannelSnapshot>,
}

/// Snapshots of one trace, ordered by timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedStates {
    states: Vec<SavedState>,
}

impl SavedStates {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedState> + '_ {
        self.states.iter()
    }

    pub fn last(&self) -> Option<&SavedState> {
        self.states.last()
    }

    /// Append a snapshot
    ///
    /// Snapshots are only taken on the first event of a timestamp, so two
    /// snapshots of one run never share a timestamp. A snapshot not later
    /// than the last one comes from a replay walking over ground already
    /// covered and is dropped. Returns whether it was kept.
    pub fn push(&mut self, state: SavedState) -> bool {
        if self
            .states
            .last()
            .is_some_and(|last| state.timestamp <= last.timestamp)
        {
            debug!(time = %state.timestamp, "snapshot already covered, dropped");
            return false;
        }
        self.states.push(state);
        true
    }

    /// Latest snapshot taken at or before `t`
    pub fn closest_at_or_before(&self, t: Timestamp) -> Option<&SavedState> {
        let after = self.states.partition_point(|s| s.timestamp <= t);
        after.checked_sub(1).map(|i| &self.states[i])
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Write the archive: a little-endian version word, then bincode
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), StateError> {
        writer.write_all(&SNAPSHOT_FORMAT_VERSION.to_le_bytes())?;
        bincode::serialize_into(&mut writer, &self.states)?;
        writer.flush()?;
        info!(snapshots = self.states.len(), "snapshot archive written");
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, StateError> {
        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        let found = u32::from_le_bytes(version);
        if found != SNAPSHOT_FORMAT_VERSION {
            return Err(StateError::InvalidVersion {
                found,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let states: Vec<SavedState> = bincode::deserialize_from(&mut reader)?;
        if states.windows(2).any(|w| w[0].timestamp >= w[1].timestamp) {
            return Err(StateError::Serialization(
                "snapshots are not in increasing time order".into(),
            ));
        }
        info!(snapshots = states.len(), "snapshot archive loaded");
        Ok(Self { states })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(t: u64) -> SavedState {
        SavedState {
            timestamp: Timestamp::from_nanos(t),
            events_applied: t,
            processes: ProcessTable::with_idle_tasks(&[0]),
            channels: vec![ChannelSnapshot {
                cpu: Some(0),
                running: Some(0),
                cursor: Some(Cursor::new(0, t, Timestamp::from_nanos(t))),
            }],
        }
    }

    #[test]
    fn test_push_is_monotonic() {
        let mut states = SavedStates::new();
        assert!(states.push(saved(10)));
        assert!(states.push(saved(20)));
        assert!(!states.push(saved(20)));
        assert!(!states.push(saved(5)));
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_closest_at_or_before() {
        let mut states = SavedStates::new();
        for t in [100, 200, 300] {
            states.push(saved(t));
        }
        let at = |t: u64| {
            states
                .closest_at_or_before(Timestamp::from_nanos(t))
                .map(|s| s.timestamp.as_nanos())
        };
        assert_eq!(at(50), None);
        assert_eq!(at(100), Some(100));
        assert_eq!(at(299), Some(200));
        assert_eq!(at(10_000), Some(300));
    }

    #[test]
    fn test_archive_in_memory() {
        let mut states = SavedStates::new();
        states.push(saved(1));
        states.push(saved(2));
        let mut buf = Vec::new();
        states.write_to(&mut buf).unwrap();
        let loaded = SavedStates::read_from(buf.as_slice()).unwrap();
        assert_eq!(loaded, states);
    }

    #[test]
    fn test_archive_version_check() {
        let mut buf = 99u32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0; 8]);
        let err = SavedStates::read_from(buf.as_slice()).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidVersion {
                found: 99,
                expected: SNAPSHOT_FORMAT_VERSION
            }
        );
    }
}
