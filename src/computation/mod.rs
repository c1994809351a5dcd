/*!
 * Background Computations
 * Named hook sets run over the traceset in chunks, with per-trace progress
 *
 * Several computations can share one traceset: their hook sets are
 * installed together around each `process_until` call and removed again
 * afterwards. Progress flags live in each trace's attribute store and can
 * be saved and restored as plain values.
 */

use crate::context::TraceSetContext;
use crate::core::errors::{ContextError, Result};
use crate::core::name::Name;
use crate::core::types::Timestamp;
use crate::hooks::HookSet;
use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Progress of one computation on one trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    #[default]
    Idle,
    InProgress,
    Ready,
}

/// Progress of every computation on one trace
#[derive(Debug, Default)]
struct TraceProgress {
    flags: Mutex<AHashMap<Name, Progress>>,
}

/// Saved progress flags, one map per trace in trace order
pub type ProgressSnapshot = Vec<BTreeMap<Name, Progress>>;

struct Computation {
    name: Name,
    hooks: HookSet,
}

/// Registered computations, in registration order
#[derive(Default)]
pub struct ComputationRegistry {
    computations: Vec<Computation>,
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, hooks: HookSet) -> std::result::Result<(), ContextError> {
        if self.contains(name) {
            return Err(ContextError::DuplicateComputation(name.into()));
        }
        self.computations.push(Computation {
            name: name.into(),
            hooks,
        });
        debug!(computation = name, "computation registered");
        Ok(())
    }

    /// Drop a computation, handing its hooks back
    pub fn unregister(&mut self, name: &str) -> Option<HookSet> {
        let index = self.computations.iter().position(|c| c.name == name)?;
        Some(self.computations.remove(index).hooks)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.computations.iter().any(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.computations.iter().map(|c| c.name.as_str())
    }

    pub fn hooks(&self, name: &str) -> Option<&HookSet> {
        self.computations
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.hooks)
    }

    /// Progress of `name` on trace `trace`; `Idle` for unknown traces
    pub fn progress(&self, ctx: &TraceSetContext, trace: usize, name: &str) -> Progress {
        ctx.trace(trace)
            .and_then(|t| t.attributes().get::<TraceProgress>())
            .and_then(|p| p.flags.lock().get(name).copied())
            .unwrap_or_default()
    }

    pub fn set_progress(
        &self,
        ctx: &TraceSetContext,
        trace: usize,
        name: &str,
        progress: Progress,
    ) -> std::result::Result<(), ContextError> {
        let trace = ctx.trace(trace).ok_or(ContextError::TraceNotFound(trace))?;
        trace
            .attributes()
            .get_or_insert_with(TraceProgress::default)
            .flags
            .lock()
            .insert(name.into(), progress);
        Ok(())
    }

    /// Copy every trace's progress flags
    pub fn save_progress(&self, ctx: &TraceSetContext) -> ProgressSnapshot {
        ctx.traces()
            .iter()
            .map(|trace| {
                trace
                    .attributes()
                    .get::<TraceProgress>()
                    .map(|p| p.flags.lock().iter().map(|(k, v)| (k.clone(), *v)).collect())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Put saved progress flags back; traces beyond the snapshot are reset
    pub fn restore_progress(&self, ctx: &TraceSetContext, saved: &ProgressSnapshot) {
        if saved.len() != ctx.traces().len() {
            warn!(
                saved = saved.len(),
                traces = ctx.traces().len(),
                "progress snapshot does not cover the traceset"
            );
        }
        for (index, trace) in ctx.traces().iter().enumerate() {
            let flags: AHashMap<Name, Progress> = saved
                .get(index)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
                .unwrap_or_default();
            *trace
                .attributes()
                .get_or_insert_with(TraceProgress::default)
                .flags
                .lock() = flags;
        }
    }

    fn mark(&self, ctx: &TraceSetContext, names: &[&str], progress: Progress) {
        for trace in ctx.traces() {
            let store = trace.attributes().get_or_insert_with(TraceProgress::default);
            let mut flags = store.flags.lock();
            for name in names {
                flags.insert((*name).into(), progress);
            }
        }
    }

    fn acquire_all(ctx: &TraceSetContext) -> std::result::Result<(), ContextError> {
        for (index, trace) in ctx.traces().iter().enumerate() {
            if !trace.try_acquire() {
                for acquired in &ctx.traces()[..index] {
                    acquired.release();
                }
                return Err(ContextError::TraceInUse(index));
            }
        }
        Ok(())
    }

    fn release_all(ctx: &TraceSetContext) {
        for trace in ctx.traces() {
            trace.release();
        }
    }

    /// Run one chunk of the named computations
    ///
    /// Installs every named hook set, processes up to `end` / `max_events`
    /// and removes the hook sets again. Every trace is marked in progress
    /// for the duration; once the traceset is exhausted the computations
    /// are marked ready. Fails with [`ContextError::TraceInUse`] when
    /// another run holds a trace.
    pub fn run(
        &self,
        ctx: &mut TraceSetContext,
        names: &[&str],
        end: Timestamp,
        max_events: Option<u64>,
    ) -> Result<u64> {
        let mut sets = Vec::with_capacity(names.len());
        for name in names {
            let hooks = self
                .hooks(name)
                .ok_or_else(|| ContextError::UnknownComputation((*name).into()))?;
            sets.push(hooks);
        }

        Self::acquire_all(ctx)?;
        self.mark(ctx, names, Progress::InProgress);

        let result = Self::run_installed(ctx, &sets, end, max_events);
        if result.is_ok() && ctx.pending_channels() == 0 {
            self.mark(ctx, names, Progress::Ready);
            info!(computations = ?names, "computations ready");
        }
        Self::release_all(ctx);
        result
    }

    fn run_installed(
        ctx: &mut TraceSetContext,
        sets: &[&HookSet],
        end: Timestamp,
        max_events: Option<u64>,
    ) -> Result<u64> {
        let mut installed = 0;
        let mut result = Ok(0);
        for hooks in sets {
            if let Err(err) = ctx.begin(hooks) {
                result = Err(err);
                break;
            }
            installed += 1;
        }
        if result.is_ok() {
            result = ctx.process_until(end, max_events, None);
        }
        for hooks in sets[..installed].iter().rev() {
            if let Err(err) = ctx.end(hooks) {
                warn!(error = %err, "removing computation hooks failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        debug!(installed, "computation chunk finished");
        result
    }
}
