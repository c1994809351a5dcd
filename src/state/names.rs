/*!
 * Name Tables
 * Per-trace submode names and the event types the state layer follows
 */

use crate::channel::{EventTypeTable, TraceMetadata};
use crate::core::name::Name;
use crate::core::types::EventTypeId;

/// Submode names of one trace, built once when the trace is attached
#[derive(Debug, Clone, Default)]
pub struct NameTables {
    syscalls: Vec<Name>,
    traps: Vec<Name>,
    irqs: Vec<Name>,
    softirqs: Vec<Name>,
}

fn lookup(table: &[Name], kind: &str, code: u64) -> Name {
    usize::try_from(code)
        .ok()
        .and_then(|i| table.get(i))
        .cloned()
        .unwrap_or_else(|| Name::from(format!("{kind} {code}")))
}

impl NameTables {
    pub fn from_metadata(metadata: &TraceMetadata) -> Self {
        Self {
            syscalls: metadata.syscall_names.clone(),
            traps: metadata.trap_names.clone(),
            irqs: metadata.irq_names.clone(),
            softirqs: metadata.softirq_names.clone(),
        }
    }

    /// Syscall name, `"syscall N"` when the trace does not name it
    pub fn syscall(&self, code: u64) -> Name {
        lookup(&self.syscalls, "syscall", code)
    }

    pub fn trap(&self, code: u64) -> Name {
        lookup(&self.traps, "trap", code)
    }

    pub fn irq(&self, code: u64) -> Name {
        lookup(&self.irqs, "irq", code)
    }

    pub fn softirq(&self, code: u64) -> Name {
        lookup(&self.softirqs, "softirq", code)
    }
}

/// Kernel events that drive process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateEvent {
    SyscallEntry,
    SyscallExit,
    TrapEntry,
    TrapExit,
    IrqEntry,
    IrqExit,
    SoftIrqEntry,
    SoftIrqExit,
    Schedule,
    Fork,
    KernelThread,
    Exit,
    Exec,
}

/// Event type names recognized by the state layer
pub const STATE_EVENT_NAMES: &[(&str, StateEvent)] = &[
    ("syscall_entry", StateEvent::SyscallEntry),
    ("syscall_exit", StateEvent::SyscallExit),
    ("trap_entry", StateEvent::TrapEntry),
    ("trap_exit", StateEvent::TrapExit),
    ("page_fault_entry", StateEvent::TrapEntry),
    ("page_fault_exit", StateEvent::TrapExit),
    ("page_fault_nosem_entry", StateEvent::TrapEntry),
    ("page_fault_nosem_exit", StateEvent::TrapExit),
    ("irq_entry", StateEvent::IrqEntry),
    ("irq_exit", StateEvent::IrqExit),
    ("softirq_entry", StateEvent::SoftIrqEntry),
    ("softirq_exit", StateEvent::SoftIrqExit),
    ("sched_schedule", StateEvent::Schedule),
    ("process_fork", StateEvent::Fork),
    ("kthread_create", StateEvent::KernelThread),
    ("process_exit", StateEvent::Exit),
    ("exec", StateEvent::Exec),
];

/// Event type id to state event, for one trace
#[derive(Debug, Clone, Default)]
pub struct StateEventRoutes {
    routes: Vec<Option<StateEvent>>,
}

impl StateEventRoutes {
    pub fn resolve(event_types: &EventTypeTable) -> Self {
        let mut routes = vec![None; event_types.len()];
        for (name, event) in STATE_EVENT_NAMES {
            if let Some(id) = event_types.id_of(name) {
                routes[id as usize] = Some(*event);
            }
        }
        Self { routes }
    }

    #[inline]
    pub fn route(&self, id: EventTypeId) -> Option<StateEvent> {
        self.routes.get(id as usize).copied().flatten()
    }

    /// Ids this trace defines for state events
    pub fn ids(&self) -> impl Iterator<Item = (EventTypeId, StateEvent)> + '_ {
        self.routes
            .iter()
            .enumerate()
            .filter_map(|(id, route)| route.map(|event| (id as EventTypeId, event)))
    }
}
