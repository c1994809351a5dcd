/*!
 * Hooks By Event Type
 * Hook lists indexed by event type id
 */

use super::list::Hooks;
use crate::core::errors::HookError;
use crate::core::types::EventTypeId;
use std::fmt;

/// One hook list per event type id
///
/// A table built for a trace is bounded by that trace's event type count and
/// rejects ids outside it. An unbounded table grows on demand and is used to
/// collect hooks before they are installed.
pub struct HooksById<F: ?Sized> {
    lists: Vec<Hooks<F>>,
    bound: Option<usize>,
}

impl<F: ?Sized> Default for HooksById<F> {
    fn default() -> Self {
        Self {
            lists: Vec::new(),
            bound: None,
        }
    }
}

impl<F: ?Sized> Clone for HooksById<F> {
    fn clone(&self) -> Self {
        Self {
            lists: self.lists.clone(),
            bound: self.bound,
        }
    }
}

impl<F: ?Sized> fmt::Debug for HooksById<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<F: ?Sized> HooksById<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table accepting ids `0..event_types`
    pub fn bounded(event_types: usize) -> Self {
        Self {
            lists: Vec::new(),
            bound: Some(event_types),
        }
    }

    #[inline]
    pub fn bound(&self) -> Option<usize> {
        self.bound
    }

    #[inline]
    pub fn accepts(&self, id: EventTypeId) -> bool {
        self.bound.map_or(true, |bound| (id as usize) < bound)
    }

    /// Hook list for `id`, created on first use
    pub fn entry(&mut self, id: EventTypeId) -> Result<&mut Hooks<F>, HookError> {
        if !self.accepts(id) {
            return Err(HookError::UnknownEventType {
                id,
                trace: 0,
                known: self.bound.unwrap_or_default(),
            });
        }
        let index = id as usize;
        if self.lists.len() <= index {
            self.lists.resize_with(index + 1, Hooks::new);
        }
        Ok(&mut self.lists[index])
    }

    #[inline]
    pub fn get(&self, id: EventTypeId) -> Option<&Hooks<F>> {
        self.lists.get(id as usize).filter(|hooks| !hooks.is_empty())
    }

    /// Non-empty lists with their ids
    pub fn iter(&self) -> impl Iterator<Item = (EventTypeId, &Hooks<F>)> + '_ {
        self.lists
            .iter()
            .enumerate()
            .filter(|(_, hooks)| !hooks.is_empty())
            .map(|(id, hooks)| (id as EventTypeId, hooks))
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Hooks::is_empty)
    }

    /// Ids this table holds hooks for
    pub fn ids(&self) -> impl Iterator<Item = EventTypeId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    /// Merge `other` in; fails without changes if any id is out of range
    pub fn add_table(&mut self, other: &HooksById<F>) -> Result<(), HookError> {
        if let Some(id) = other.ids().find(|id| !self.accepts(*id)) {
            return Err(HookError::UnknownEventType {
                id,
                trace: 0,
                known: self.bound.unwrap_or_default(),
            });
        }
        for (id, hooks) in other.iter() {
            self.entry(id)?.add_list(hooks);
        }
        Ok(())
    }

    pub fn remove_table(&mut self, other: &HooksById<F>) {
        for (id, hooks) in other.iter() {
            if let Some(list) = self.lists.get_mut(id as usize) {
                list.remove_list(hooks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Noop = dyn Fn() -> bool + Send + Sync;

    fn noop() -> Arc<Noop> {
        Arc::new(|| false)
    }

    #[test]
    fn test_bounded_rejects_unknown_ids() {
        let mut table: HooksById<Noop> = HooksById::bounded(3);
        assert!(table.entry(2).is_ok());
        assert!(matches!(
            table.entry(3),
            Err(HookError::UnknownEventType { id: 3, known: 3, .. })
        ));
    }

    #[test]
    fn test_add_table_is_all_or_nothing() {
        let mut source: HooksById<Noop> = HooksById::new();
        source.entry(1).unwrap().add(noop(), 0);
        source.entry(7).unwrap().add(noop(), 0);

        let mut target = HooksById::bounded(4);
        assert!(target.add_table(&source).is_err());
        assert!(target.is_empty());
    }

    #[test]
    fn test_add_remove_table() {
        let mut source: HooksById<Noop> = HooksById::new();
        source.entry(1).unwrap().add(noop(), 0);

        let mut target = HooksById::bounded(4);
        target.add_table(&source).unwrap();
        assert_eq!(target.ids().collect::<Vec<_>>(), vec![1]);
        target.remove_table(&source);
        assert!(target.get(1).is_none());
    }
}
