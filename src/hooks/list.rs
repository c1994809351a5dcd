/*!
 * Hook Lists
 * Priority-sorted, reference-counted callback lists
 */

use super::Priority;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

struct HookEntry<F: ?Sized> {
    hook: Arc<F>,
    priority: Priority,
    ref_count: u32,
}

impl<F: ?Sized> Clone for HookEntry<F> {
    fn clone(&self) -> Self {
        Self {
            hook: Arc::clone(&self.hook),
            priority: self.priority,
            ref_count: self.ref_count,
        }
    }
}

/// Ordered list of hooks
///
/// Lower priority values run first; equal priorities keep insertion order.
/// Hooks are identified by their `Arc` allocation, so adding the same `Arc`
/// twice bumps a reference count and the hook still runs once per call.
pub struct Hooks<F: ?Sized> {
    entries: Vec<HookEntry<F>>,
}

impl<F: ?Sized> Default for Hooks<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Clone for Hooks<F> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Hooks<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.priority, e.ref_count)))
            .finish()
    }
}

impl<F: ?Sized> Hooks<F> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position_of(&self, hook: &Arc<F>) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| std::ptr::addr_eq(Arc::as_ptr(&e.hook), Arc::as_ptr(hook)))
    }

    fn insert_sorted(&mut self, entry: HookEntry<F>) {
        let at = self
            .entries
            .partition_point(|e| e.priority <= entry.priority);
        self.entries.insert(at, entry);
    }

    fn add_counted(&mut self, hook: &Arc<F>, priority: Priority, count: u32) {
        if let Some(i) = self.position_of(hook) {
            let existing = &mut self.entries[i];
            if existing.priority != priority {
                warn!(
                    existing = existing.priority,
                    requested = priority,
                    "hook re-added with a different priority, keeping the first"
                );
            }
            existing.ref_count += count;
            return;
        }
        self.insert_sorted(HookEntry {
            hook: Arc::clone(hook),
            priority,
            ref_count: count,
        });
    }

    /// Add a hook, or bump its reference count if already present
    pub fn add(&mut self, hook: Arc<F>, priority: Priority) {
        self.add_counted(&hook, priority, 1);
    }

    /// Drop one reference to `hook`; returns true if the hook left the list
    pub fn remove(&mut self, hook: &Arc<F>) -> bool {
        let Some(i) = self.position_of(hook) else {
            return false;
        };
        if self.entries[i].ref_count > 1 {
            self.entries[i].ref_count -= 1;
            false
        } else {
            self.entries.remove(i);
            true
        }
    }

    /// Merge every entry of `other` into this list
    pub fn add_list(&mut self, other: &Hooks<F>) {
        for entry in &other.entries {
            self.add_counted(&entry.hook, entry.priority, entry.ref_count);
        }
    }

    /// Undo a previous [`add_list`](Self::add_list)
    pub fn remove_list(&mut self, other: &Hooks<F>) {
        for entry in &other.entries {
            for _ in 0..entry.ref_count {
                self.remove(&entry.hook);
            }
        }
    }

    pub fn contains(&self, hook: &Arc<F>) -> bool {
        self.position_of(hook).is_some()
    }

    /// Hooks in dispatch order with their priorities
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<F>, Priority)> + '_ {
        self.entries.iter().map(|e| (&e.hook, e.priority))
    }

    /// Run every hook; true if any requested stop
    pub fn call_with(&self, mut invoke: impl FnMut(&F) -> bool) -> bool {
        let mut stop = false;
        for entry in &self.entries {
            stop |= invoke(&entry.hook);
        }
        stop
    }

    /// Run hooks until one requests stop
    pub fn call_check_with(&self, mut invoke: impl FnMut(&F) -> bool) -> bool {
        self.entries.iter().any(|e| invoke(&e.hook))
    }
}

/// Walk a by-id list and a catch-all list as one priority-ordered sequence
///
/// On equal priority the by-id hook goes first.
fn merged<'a, F: ?Sized>(
    by_id: Option<&'a Hooks<F>>,
    catch_all: &'a Hooks<F>,
) -> impl Iterator<Item = &'a F> + 'a {
    let mut first = by_id.map(|h| h.entries.as_slice()).unwrap_or(&[]).iter().peekable();
    let mut second = catch_all.entries.iter().peekable();
    std::iter::from_fn(move || {
        let take_first = match (first.peek(), second.peek()) {
            (Some(a), Some(b)) => a.priority <= b.priority,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        let entry = if take_first { first.next() } else { second.next() };
        entry.map(|e| &*e.hook)
    })
}

/// Run both lists in merged priority order; true if any hook requested stop
pub fn call_merge_with<F: ?Sized>(
    by_id: Option<&Hooks<F>>,
    catch_all: &Hooks<F>,
    mut invoke: impl FnMut(&F) -> bool,
) -> bool {
    let mut stop = false;
    for hook in merged(by_id, catch_all) {
        stop |= invoke(hook);
    }
    stop
}

/// Short-circuit variant of [`call_merge_with`]
pub fn call_check_merge_with<F: ?Sized>(
    by_id: Option<&Hooks<F>>,
    catch_all: &Hooks<F>,
    mut invoke: impl FnMut(&F) -> bool,
) -> bool {
    merged(by_id, catch_all).any(|hook| invoke(hook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Probe = dyn Fn(&Mutex<Vec<&'static str>>) -> bool + Send + Sync;

    fn probe(tag: &'static str, stop: bool) -> Arc<Probe> {
        Arc::new(move |log: &Mutex<Vec<&'static str>>| {
            log.lock().push(tag);
            stop
        })
    }

    fn run(hooks: &Hooks<Probe>) -> (bool, Vec<&'static str>) {
        let log = Mutex::new(Vec::new());
        let stop = hooks.call_with(|h| h(&log));
        (stop, log.into_inner())
    }

    #[test]
    fn test_priority_then_insertion_order() {
        let mut hooks = Hooks::new();
        hooks.add(probe("late", false), 50);
        hooks.add(probe("early", false), 0);
        hooks.add(probe("late2", false), 50);
        hooks.add(probe("mid", false), 25);
        assert_eq!(run(&hooks).1, vec!["early", "mid", "late", "late2"]);
    }

    #[test]
    fn test_duplicate_counts_references() {
        let mut hooks = Hooks::new();
        let hook = probe("a", false);
        hooks.add(Arc::clone(&hook), 10);
        hooks.add(Arc::clone(&hook), 10);
        assert_eq!(hooks.len(), 1);
        assert_eq!(run(&hooks).1, vec!["a"]);
        assert!(!hooks.remove(&hook));
        assert!(hooks.contains(&hook));
        assert!(hooks.remove(&hook));
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_call_runs_all_call_check_stops() {
        let mut hooks = Hooks::new();
        hooks.add(probe("a", true), 0);
        hooks.add(probe("b", false), 1);
        assert_eq!(run(&hooks), (true, vec!["a", "b"]));

        let log = Mutex::new(Vec::new());
        assert!(hooks.call_check_with(|h| h(&log)));
        assert_eq!(log.into_inner(), vec!["a"]);
    }

    #[test]
    fn test_merge_order() {
        let mut by_id = Hooks::new();
        by_id.add(probe("id10", false), 10);
        by_id.add(probe("id50", false), 50);
        let mut all = Hooks::new();
        all.add(probe("all0", false), 0);
        all.add(probe("all10", true), 10);

        let log = Mutex::new(Vec::new());
        let stop = call_merge_with(Some(&by_id), &all, |h| h(&log));
        assert!(stop);
        assert_eq!(log.into_inner(), vec!["all0", "id10", "all10", "id50"]);

        let log = Mutex::new(Vec::new());
        assert!(call_check_merge_with(Some(&by_id), &all, |h| h(&log)));
        assert_eq!(log.into_inner(), vec!["all0", "id10", "all10"]);
    }

    #[test]
    fn test_add_list_remove_list() {
        let shared = probe("shared", false);
        let mut target = Hooks::new();
        target.add(Arc::clone(&shared), 5);

        let mut list = Hooks::new();
        list.add(Arc::clone(&shared), 5);
        list.add(probe("other", false), 1);

        target.add_list(&list);
        assert_eq!(target.len(), 2);
        target.remove_list(&list);
        assert_eq!(target.len(), 1);
        assert!(target.contains(&shared));
    }
}
