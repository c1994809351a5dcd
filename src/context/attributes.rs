/*!
 * Attribute Stores
 * Typed per-layer storage attached to traceset, trace and channel contexts
 */

use ahash::AHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

type Slot = Arc<dyn Any + Send + Sync>;

/// Values keyed by their type
///
/// Each layer stores its own payload type, so layers never see each other's
/// data. Values are shared `Arc`s; hooks mutate them through their own
/// interior locking.
#[derive(Default)]
pub struct Attributes {
    values: RwLock<AHashMap<TypeId, Slot>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.insert_arc(Arc::new(value))
    }

    pub fn insert_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.values
            .write()
            .insert(TypeId::of::<T>(), value)
            .and_then(|old| old.downcast::<T>().ok())
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|slot| slot.downcast::<T>().ok())
    }

    /// Value of type `T`, created by `init` if absent
    pub fn get_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get::<T>() {
            return value;
        }
        let mut values = self.values.write();
        let slot = values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(init()) as Slot)
            .clone();
        drop(values);
        match slot.downcast::<T>() {
            Ok(value) => value,
            // Keys are the value's own TypeId.
            Err(_) => unreachable!("attribute stored under a foreign TypeId"),
        }
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .write()
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes").field("len", &self.len()).finish()
    }
}
