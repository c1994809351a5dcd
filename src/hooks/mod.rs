/*!
 * Hook Registry
 * Priority-ordered callbacks invoked per event and per lifecycle boundary
 *
 * Hooks return `true` to ask the running scheduler to stop after the
 * current event. Mutable hook state lives behind locks or atomics in the
 * closure itself; dispatch only hands out shared references.
 */

mod by_id;
mod list;
mod set;

pub use by_id::HooksById;
pub use list::{call_check_merge_with, call_merge_with, Hooks};
pub use set::{ChannelHooksById, HookSet};

use crate::context::{EventContext, LifecycleContext};
use std::sync::Arc;

/// Hook priority; lower values run first
pub type Priority = i32;

/// Runs before everything else
pub const PRIORITY_HIGH: Priority = 0;

/// State reconstruction hooks
pub const PRIORITY_STATE: Priority = 25;

/// Default for analysis hooks, which then observe up-to-date state
pub const PRIORITY_DEFAULT: Priority = 50;

/// Per-event hook
pub type EventHookFn = dyn Fn(&EventContext<'_>) -> bool + Send + Sync;

/// Traceset, trace and channel boundary hook
pub type LifecycleHookFn = dyn Fn(&LifecycleContext<'_>) -> bool + Send + Sync;

/// Wrap a closure as a shareable event hook
pub fn event_hook<H>(hook: H) -> Arc<EventHookFn>
where
    H: Fn(&EventContext<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(hook)
}

/// Wrap a closure as a shareable lifecycle hook
pub fn lifecycle_hook<H>(hook: H) -> Arc<LifecycleHookFn>
where
    H: Fn(&LifecycleContext<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(hook)
}

impl Hooks<EventHookFn> {
    #[inline]
    pub fn call(&self, ctx: &EventContext<'_>) -> bool {
        self.call_with(|hook| hook(ctx))
    }

    #[inline]
    pub fn call_check(&self, ctx: &EventContext<'_>) -> bool {
        self.call_check_with(|hook| hook(ctx))
    }

    /// Dispatch one event through a by-id list and this catch-all list
    #[inline]
    pub fn call_merge(&self, by_id: Option<&Hooks<EventHookFn>>, ctx: &EventContext<'_>) -> bool {
        call_merge_with(by_id, self, |hook| hook(ctx))
    }

    #[inline]
    pub fn call_check_merge(
        &self,
        by_id: Option<&Hooks<EventHookFn>>,
        ctx: &EventContext<'_>,
    ) -> bool {
        call_check_merge_with(by_id, self, |hook| hook(ctx))
    }
}

impl Hooks<LifecycleHookFn> {
    #[inline]
    pub fn call(&self, ctx: &LifecycleContext<'_>) -> bool {
        self.call_with(|hook| hook(ctx))
    }

    #[inline]
    pub fn call_check(&self, ctx: &LifecycleContext<'_>) -> bool {
        self.call_check_with(|hook| hook(ctx))
    }
}
