/*!
 * Decoded Events
 * Events, field values, per-trace event type tables and trace metadata
 */

use crate::core::name::Name;
use crate::core::types::{Cpu, EventTypeId, Timestamp};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Value of one decoded event field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Text(Name),
}

impl FieldValue {
    /// Integer view, negative values excluded
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) => u64::try_from(*v).ok(),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Unsigned(v) => i64::try_from(*v).ok(),
            FieldValue::Signed(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Unsigned(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Unsigned(u64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Signed(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.into())
    }
}

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub event_type: EventTypeId,
    pub cpu: Cpu,
    #[serde(default)]
    pub fields: Vec<(Name, FieldValue)>,
}

impl Event {
    pub fn new(timestamp: Timestamp, event_type: EventTypeId, cpu: Cpu) -> Self {
        Self {
            timestamp,
            event_type,
            cpu,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_str() == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(FieldValue::as_u64)
    }

    #[inline]
    pub fn field_i64(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(FieldValue::as_i64)
    }

    #[inline]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }
}

/// Event type ids and names of one trace
///
/// Ids are dense and local to the trace that defines them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Name>", into = "Vec<Name>")]
pub struct EventTypeTable {
    names: Vec<Name>,
    by_name: AHashMap<Name, EventTypeId>,
}

impl EventTypeTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        Self::from(names.into_iter().map(Into::into).collect::<Vec<Name>>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: EventTypeId) -> bool {
        (id as usize) < self.names.len()
    }

    pub fn id_of(&self, name: &str) -> Option<EventTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: EventTypeId) -> Option<&Name> {
        self.names.get(id as usize)
    }
}

impl From<Vec<Name>> for EventTypeTable {
    fn from(names: Vec<Name>) -> Self {
        let by_name = names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id as EventTypeId))
            .collect();
        Self { names, by_name }
    }
}

impl From<EventTypeTable> for Vec<Name> {
    fn from(table: EventTypeTable) -> Self {
        table.names
    }
}

/// Naming metadata recorded with a trace
///
/// Entry `i` of each list names code `i`; the state layer builds its
/// immutable submode tables from these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMetadata {
    #[serde(default)]
    pub syscall_names: Vec<Name>,
    #[serde(default)]
    pub trap_names: Vec<Name>,
    #[serde(default)]
    pub irq_names: Vec<Name>,
    #[serde(default)]
    pub softirq_names: Vec<Name>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let event = Event::new(Timestamp::from_nanos(5), 0, 1)
            .with_field("prev_pid", 7u64)
            .with_field("prev_state", -1i64)
            .with_field("filename", "/bin/true");
        assert_eq!(event.field_u64("prev_pid"), Some(7));
        assert_eq!(event.field_u64("prev_state"), None);
        assert_eq!(event.field_i64("prev_state"), Some(-1));
        assert_eq!(event.field_str("filename"), Some("/bin/true"));
        assert!(event.field("missing").is_none());
    }

    #[test]
    fn test_event_type_table() {
        let table = EventTypeTable::new(["syscall_entry", "syscall_exit"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.id_of("syscall_exit"), Some(1));
        assert_eq!(table.name_of(0).map(Name::as_str), Some("syscall_entry"));
        assert!(!table.contains(2));
    }

    #[test]
    fn test_event_type_table_json() {
        let table: EventTypeTable = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(table.id_of("b"), Some(1));
    }
}
