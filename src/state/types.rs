/*!
 * Process State Types
 * Execution modes, statuses, stack frames and processes
 */

use crate::core::name::Name;
use crate::core::types::{Cpu, Pid, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a process is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Unknown,
    User,
    Syscall,
    Trap,
    Irq,
    SoftIrq,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionMode::Unknown => "unknown",
            ExecutionMode::User => "user",
            ExecutionMode::Syscall => "syscall",
            ExecutionMode::Trap => "trap",
            ExecutionMode::Irq => "irq",
            ExecutionMode::SoftIrq => "softirq",
        })
    }
}

/// Scheduling status of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Unnamed,
    WaitFork,
    WaitCpu,
    Exit,
    Wait,
    Run,
}

/// User or kernel thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    #[default]
    UserThread,
    KernelThread,
}

/// Submode used when nothing more specific is known
pub const SUBMODE_NONE: &str = "none";

/// Name given to processes before exec or fork tells us better
pub const UNNAMED: &str = "unnamed";

/// One frame of a process's execution stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub mode: ExecutionMode,
    pub submode: Name,
    pub entry: Timestamp,
    pub change: Timestamp,
    pub status: ProcessStatus,
    /// CPU time spent in this frame while running, nested frames excluded
    pub cum_cpu_time: Duration,
}

impl ExecutionState {
    pub fn new(mode: ExecutionMode, submode: Name, status: ProcessStatus, now: Timestamp) -> Self {
        Self {
            mode,
            submode,
            entry: now,
            change: now,
            status,
            cum_cpu_time: Duration::ZERO,
        }
    }

    /// Charge the running time since the last change to this frame
    pub(crate) fn accrue(&mut self, now: Timestamp) {
        if self.status == ProcessStatus::Run {
            self.cum_cpu_time += now.duration_since(self.change);
        }
    }
}

/// Why a pop was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopRejected {
    /// Top frame is in another mode
    ModeMismatch {
        top: ExecutionMode,
        requested: ExecutionMode,
    },
    /// Only the baseline frame is left
    BottomFrame,
}

/// Table key of a process
///
/// Pid 0 is the per-CPU idle task, so it is keyed by CPU as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessKey {
    pub pid: Pid,
    pub cpu: Option<Cpu>,
}

impl ProcessKey {
    #[inline]
    pub fn new(pid: Pid, cpu: Cpu) -> Self {
        Self {
            pid,
            cpu: (pid == 0).then_some(cpu),
        }
    }
}

/// Stable identity of a process across pid reuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: Pid,
    pub creation_time: Timestamp,
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pid, self.creation_time)
    }
}

/// Reconstructed state of one process
///
/// The execution stack always holds at least the baseline frame; archives
/// with an empty stack are rejected when read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProcessRecord")]
pub struct Process {
    pub pid: Pid,
    pub ppid: Pid,
    pub tgid: Pid,
    pub name: Name,
    pub kind: ProcessType,
    /// Zero when the creation was not observed
    pub creation_time: Timestamp,
    /// When the process entered the table
    pub insertion_time: Timestamp,
    pub cpu: Cpu,
    stack: Vec<ExecutionState>,
}

#[derive(Deserialize)]
struct ProcessRecord {
    pid: Pid,
    ppid: Pid,
    tgid: Pid,
    name: Name,
    kind: ProcessType,
    creation_time: Timestamp,
    insertion_time: Timestamp,
    cpu: Cpu,
    stack: Vec<ExecutionState>,
}

impl TryFrom<ProcessRecord> for Process {
    type Error = String;

    fn try_from(record: ProcessRecord) -> Result<Self, Self::Error> {
        if record.stack.is_empty() {
            return Err(format!("process {} has no execution state", record.pid));
        }
        Ok(Self {
            pid: record.pid,
            ppid: record.ppid,
            tgid: record.tgid,
            name: record.name,
            kind: record.kind,
            creation_time: record.creation_time,
            insertion_time: record.insertion_time,
            cpu: record.cpu,
            stack: record.stack,
        })
    }
}

impl Process {
    /// Process with a single baseline frame
    pub fn new(pid: Pid, cpu: Cpu, now: Timestamp, baseline: ExecutionState) -> Self {
        Self {
            pid,
            ppid: 0,
            tgid: 0,
            name: Name::from(UNNAMED),
            kind: ProcessType::UserThread,
            creation_time: Timestamp::ZERO,
            insertion_time: now,
            cpu,
            stack: vec![baseline],
        }
    }

    pub fn key(&self) -> ProcessKey {
        ProcessKey::new(self.pid, self.cpu)
    }

    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            creation_time: self.creation_time,
        }
    }

    /// Top of the execution stack
    #[inline]
    pub fn state(&self) -> &ExecutionState {
        // The stack is created with one frame and pop never removes the last.
        &self.stack[self.stack.len() - 1]
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut ExecutionState {
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    pub fn stack(&self) -> &[ExecutionState] {
        &self.stack
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Enter a nested mode; the new frame inherits the current status
    pub fn push(&mut self, mode: ExecutionMode, submode: Name, now: Timestamp) {
        let top = self.state_mut();
        top.accrue(now);
        top.change = now;
        let status = top.status;
        self.stack
            .push(ExecutionState::new(mode, submode, status, now));
    }

    /// Leave the current mode
    ///
    /// The baseline frame is never popped, and a pop for another mode than
    /// the top frame's is refused; both leave the stack untouched.
    pub fn pop(&mut self, mode: ExecutionMode, now: Timestamp) -> Result<(), PopRejected> {
        let top = self.state().mode;
        if top != mode {
            return Err(PopRejected::ModeMismatch {
                top,
                requested: mode,
            });
        }
        if self.stack.len() == 1 {
            return Err(PopRejected::BottomFrame);
        }
        self.stack.pop();
        self.state_mut().change = now;
        Ok(())
    }

    /// Replace the whole stack with one frame
    pub fn reset_stack(&mut self, baseline: ExecutionState) {
        self.stack.clear();
        self.stack.push(baseline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: u64) -> Timestamp {
        Timestamp::from_nanos(n)
    }

    fn process() -> Process {
        let baseline = ExecutionState::new(
            ExecutionMode::User,
            SUBMODE_NONE.into(),
            ProcessStatus::Run,
            ts(0),
        );
        Process::new(7, 0, ts(0), baseline)
    }

    #[test]
    fn test_empty_stack_is_not_deserialized() {
        let bytes = bincode::serialize(&process()).unwrap();
        assert_eq!(bincode::deserialize::<Process>(&bytes).unwrap(), process());

        let mut hollow = process();
        hollow.stack.clear();
        let bytes = bincode::serialize(&hollow).unwrap();
        assert!(bincode::deserialize::<Process>(&bytes).is_err());
    }

    #[test]
    fn test_archive_with_empty_stack_is_rejected() {
        use crate::core::errors::StateError;
        use crate::state::{ProcessTable, SavedState, SavedStates};

        let mut processes = ProcessTable::with_idle_tasks(&[0]);
        processes.get_mut(0, 0).unwrap().stack.clear();
        let mut archive = SavedStates::new();
        assert!(archive.push(SavedState {
            timestamp: ts(10),
            events_applied: 10,
            processes,
            channels: Vec::new(),
        }));

        let mut bytes = Vec::new();
        archive.write_to(&mut bytes).unwrap();
        assert!(matches!(
            SavedStates::read_from(bytes.as_slice()),
            Err(StateError::Serialization(_))
        ));
    }

    #[test]
    fn test_push_inherits_status() {
        let mut p = process();
        p.push(ExecutionMode::Syscall, "sys_read".into(), ts(10));
        assert_eq!(p.depth(), 2);
        assert_eq!(p.state().status, ProcessStatus::Run);
        assert_eq!(p.state().entry, ts(10));
        assert_eq!(p.stack()[0].cum_cpu_time, Duration::from_nanos(10));
    }

    #[test]
    fn test_pop_rules() {
        let mut p = process();
        assert_eq!(
            p.pop(ExecutionMode::User, ts(1)),
            Err(PopRejected::BottomFrame)
        );
        p.push(ExecutionMode::Irq, "timer".into(), ts(5));
        assert_eq!(
            p.pop(ExecutionMode::Syscall, ts(6)),
            Err(PopRejected::ModeMismatch {
                top: ExecutionMode::Irq,
                requested: ExecutionMode::Syscall
            })
        );
        assert_eq!(p.depth(), 2);
        p.pop(ExecutionMode::Irq, ts(8)).unwrap();
        assert_eq!(p.depth(), 1);
        assert_eq!(p.state().change, ts(8));
    }

    #[test]
    fn test_idle_key_per_cpu() {
        assert_ne!(ProcessKey::new(0, 0), ProcessKey::new(0, 1));
        assert_eq!(ProcessKey::new(5, 0), ProcessKey::new(5, 1));
    }

    #[test]
    fn test_identity_display() {
        let mut p = process();
        p.creation_time = ts(1_000_000_002);
        assert_eq!(p.identity().to_string(), "7-1.000000002");
    }
}
