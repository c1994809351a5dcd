/*!
 * Merge Scheduler
 * One globally ordered event stream out of many forward-only channels
 *
 * The queue holds one key per non-exhausted channel. Keys order by
 * `(timestamp, trace index, channel index)`, so channels sharing a timestamp
 * always come out in the same order.
 */

mod entry;
mod process;

pub use entry::{MergeKey, MergeQueue};
pub(crate) use process::Dispatch;
