/*!
 * Process Table
 * Live processes of one trace and the process running on each CPU
 */

use super::types::{
    ExecutionMode, ExecutionState, Process, ProcessKey, ProcessStatus, SUBMODE_NONE,
};
use crate::core::types::{Cpu, Pid, Timestamp};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// Processes keyed by [`ProcessKey`], plus per-CPU running pid
///
/// Cloning deep-copies every process and its execution stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTable {
    processes: AHashMap<ProcessKey, Process>,
    running: BTreeMap<Cpu, Pid>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding only the idle task of each CPU
    pub fn with_idle_tasks(cpus: &[Cpu]) -> Self {
        let mut table = Self::new();
        for &cpu in cpus {
            table.insert_idle(cpu);
        }
        table
    }

    fn insert_idle(&mut self, cpu: Cpu) {
        self.running.insert(cpu, 0);
        self.processes
            .entry(ProcessKey::new(0, cpu))
            .or_insert_with(|| idle_task(cpu));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Look up `pid`; `cpu` only matters for the idle task
    pub fn get(&self, pid: Pid, cpu: Cpu) -> Option<&Process> {
        self.processes.get(&ProcessKey::new(pid, cpu))
    }

    pub fn get_mut(&mut self, pid: Pid, cpu: Cpu) -> Option<&mut Process> {
        self.processes.get_mut(&ProcessKey::new(pid, cpu))
    }

    pub fn contains(&self, pid: Pid, cpu: Cpu) -> bool {
        self.processes.contains_key(&ProcessKey::new(pid, cpu))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> + '_ {
        self.processes.values()
    }

    /// Pid running on `cpu`
    pub fn running_pid(&self, cpu: Cpu) -> Option<Pid> {
        self.running.get(&cpu).copied()
    }

    pub fn running(&self, cpu: Cpu) -> Option<&Process> {
        self.get(self.running_pid(cpu)?, cpu)
    }

    /// Process running on `cpu`, the CPU's idle task if none is known
    pub fn running_mut(&mut self, cpu: Cpu) -> &mut Process {
        let pid = match self.running_pid(cpu) {
            Some(pid) if self.contains(pid, cpu) => pid,
            _ => {
                self.running.insert(cpu, 0);
                0
            }
        };
        self.processes
            .entry(ProcessKey::new(pid, cpu))
            .or_insert_with(|| idle_task(cpu))
    }

    pub fn set_running(&mut self, cpu: Cpu, pid: Pid) {
        self.running.insert(cpu, pid);
    }

    /// Per-CPU running pids, ordered by CPU
    pub fn running_pids(&self) -> impl Iterator<Item = (Cpu, Pid)> + '_ {
        self.running.iter().map(|(cpu, pid)| (*cpu, *pid))
    }

    /// Create a process with the `user` / `wait_fork` baseline frame
    ///
    /// With a parent the creation time is `now`; without one the creation
    /// was not observed and stays zero.
    pub fn create(
        &mut self,
        parent: Option<Pid>,
        pid: Pid,
        tgid: Pid,
        cpu: Cpu,
        now: Timestamp,
    ) -> &mut Process {
        let process = spawn(parent, pid, tgid, cpu, now);
        match self.processes.entry(process.key()) {
            Entry::Occupied(mut slot) => {
                slot.insert(process);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(process),
        }
    }

    /// Existing process, or a new parentless one
    pub fn find_or_create(&mut self, pid: Pid, cpu: Cpu, now: Timestamp) -> &mut Process {
        self.processes
            .entry(ProcessKey::new(pid, cpu))
            .or_insert_with(|| spawn(None, pid, 0, cpu, now))
    }

    /// Drop a process from the live table
    pub fn remove(&mut self, pid: Pid, cpu: Cpu) -> Option<Process> {
        let removed = self.processes.remove(&ProcessKey::new(pid, cpu));
        if removed.is_some() {
            debug!(pid, cpu, "process removed");
        }
        removed
    }
}

fn idle_task(cpu: Cpu) -> Process {
    let baseline = ExecutionState::new(
        ExecutionMode::Unknown,
        SUBMODE_NONE.into(),
        ProcessStatus::Unnamed,
        Timestamp::ZERO,
    );
    Process::new(0, cpu, Timestamp::ZERO, baseline)
}

fn spawn(parent: Option<Pid>, pid: Pid, tgid: Pid, cpu: Cpu, now: Timestamp) -> Process {
    let baseline = ExecutionState::new(
        ExecutionMode::User,
        SUBMODE_NONE.into(),
        ProcessStatus::WaitFork,
        now,
    );
    let mut process = Process::new(pid, cpu, now, baseline);
    process.tgid = tgid;
    if let Some(ppid) = parent {
        process.ppid = ppid;
        process.creation_time = now;
    }
    debug!(pid, ppid = process.ppid, cpu, time = %now, "process created");
    process
}
