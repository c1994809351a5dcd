/*!
 * Positions
 * Save, restore, compare and seek the read heads of a whole traceset
 *
 * A position holds one slot per channel in roster order. A slot is either a
 * copy of the channel's cursor or empty when the channel had no pending
 * event. Positions are plain values: they can be cloned, serialized and
 * handed to other threads.
 */

mod seek;

pub use seek::{EventPredicate, SeekOptions};

use crate::channel::Cursor;
use crate::context::{ChannelContext, TraceSetContext};
use crate::core::errors::{ChannelError, PositionError, Result, TraceError};
use crate::core::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Snapshot of every channel's read head
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    roster: u64,
    slots: Vec<Option<Cursor>>,
    timestamp: Timestamp,
}

impl Position {
    fn new(roster: u64, slots: Vec<Option<Cursor>>) -> Self {
        let timestamp = slots
            .iter()
            .flatten()
            .map(|c| c.timestamp)
            .min()
            .unwrap_or(Timestamp::INFINITE);
        Self {
            roster,
            slots,
            timestamp,
        }
    }

    /// Roster generation the position was taken against
    #[inline]
    pub fn roster(&self) -> u64 {
        self.roster
    }

    pub fn slots(&self) -> &[Option<Cursor>] {
        &self.slots
    }

    /// Earliest pending timestamp, `INFINITE` when every slot is empty
    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// True when no channel had a pending event
    pub fn is_end(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn check_compatible(&self, roster: u64, slots: usize) -> std::result::Result<(), PositionError> {
        if self.roster != roster || self.slots.len() != slots {
            return Err(PositionError::RosterMismatch {
                expected_roster: self.roster,
                actual_roster: roster,
                expected_slots: self.slots.len(),
                actual_slots: slots,
            });
        }
        Ok(())
    }

    /// Order two positions of the same roster
    ///
    /// Slot by slot, the first differing slot decides; an empty slot sorts
    /// after any cursor.
    pub fn try_compare(&self, other: &Position) -> std::result::Result<Ordering, PositionError> {
        other.check_compatible(self.roster, self.slots.len())?;
        Ok(compare_slots(
            self.slots.iter().copied(),
            other.slots.iter().copied(),
        ))
    }
}

impl PartialOrd for Position {
    /// `None` for positions of different rosters
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_compare(other).ok()
    }
}

#[inline]
fn compare_slot(a: Option<&Cursor>, b: Option<&Cursor>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

fn compare_slots<A, B>(a: A, b: B) -> Ordering
where
    A: Iterator<Item = Option<Cursor>>,
    B: Iterator<Item = Option<Cursor>>,
{
    a.zip(b)
        .map(|(a, b)| compare_slot(a.as_ref(), b.as_ref()))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

impl TraceSetContext {
    /// Capture every channel's pending cursor
    pub fn save_position(&self) -> Position {
        Position::new(self.roster(), self.channels().map(|c| c.cursor()).collect())
    }

    pub(crate) fn check_roster(&self, position: &Position) -> std::result::Result<(), PositionError> {
        position.check_compatible(self.roster(), self.channel_count())
    }

    /// Put every channel back where `position` found it
    ///
    /// Empty slots mark their channel exhausted. The merge queue is rebuilt
    /// from scratch, so restoring twice gives the same state.
    pub fn restore_position(&mut self, position: &Position) -> Result<()> {
        self.check_roster(position)?;
        self.reposition(|slot, channel| {
            channel.seek_cursor(position.slots.get(slot).and_then(Option::as_ref))
        })?;
        debug!(timestamp = %position.timestamp, "position restored");
        Ok(())
    }

    /// Seek to a saved position
    #[inline]
    pub fn seek_position(&mut self, position: &Position) -> Result<()> {
        self.restore_position(position)
    }

    /// Order the current read heads against `position`
    pub fn compare_position(&self, position: &Position) -> Result<Ordering> {
        self.check_roster(position)?;
        Ok(compare_slots(
            self.channels().map(ChannelContext::cursor),
            position.slots.iter().copied(),
        ))
    }

    /// Move every channel to its first event at or after `t`
    pub fn seek_time(&mut self, t: Timestamp) -> Result<()> {
        self.reposition(|_, channel| channel.seek_time(t))?;
        debug!(time = %t, pending = self.pending_channels(), "seeked to time");
        Ok(())
    }

    /// Apply `seek` to every channel in roster order, then rebuild the queue
    ///
    /// When a channel refuses, every channel goes back to the read head it
    /// had before the call and the first error is returned.
    fn reposition<F>(&mut self, mut seek: F) -> Result<()>
    where
        F: FnMut(usize, &mut ChannelContext) -> std::result::Result<(), ChannelError>,
    {
        let origin = self.save_position();
        let mut failure = None;
        for (slot, channel) in self.channels_mut().enumerate() {
            if let Err(source) = seek(slot, channel) {
                failure = Some(TraceError::channel(channel.handle(), source));
                break;
            }
        }

        if let Some(err) = failure {
            for (channel, cursor) in self.channels_mut().zip(&origin.slots) {
                if let Err(rollback) = channel.seek_cursor(cursor.as_ref()) {
                    warn!(channel = %channel.handle(), error = %rollback, "channel lost its read head");
                    channel.mark_exhausted();
                }
            }
            self.rebuild_queue();
            return Err(err);
        }

        self.rebuild_queue();
        Ok(())
    }
}
