/*!
 * State Transitions
 * How each kernel event changes the process table
 *
 * Traces routinely lose events at buffer boundaries, so a transition that
 * does not fit the current state is logged and skipped, never fatal.
 */

use super::names::StateEvent;
use super::trace::TraceState;
use super::types::{
    ExecutionMode, ExecutionState, PopRejected, ProcessStatus, ProcessType, SUBMODE_NONE, UNNAMED,
};
use crate::channel::Event;
use crate::core::name::Name;
use crate::core::types::{Cpu, Pid, Timestamp};
use tracing::{debug, trace, warn};

/// `prev_state` of a task preempted while runnable
const TASK_RUNNING: i64 = 0;

fn pid_field(event: &Event, name: &str) -> Option<Pid> {
    event.field_u64(name).and_then(|v| Pid::try_from(v).ok())
}

impl TraceState {
    /// Apply one state event seen on `cpu` at `now`
    pub(super) fn apply(&mut self, kind: StateEvent, event: &Event, cpu: Cpu, now: Timestamp) {
        match kind {
            StateEvent::SyscallEntry => self.enter(event, cpu, now, ExecutionMode::Syscall, "syscall_id"),
            StateEvent::TrapEntry => self.enter(event, cpu, now, ExecutionMode::Trap, "trap_id"),
            StateEvent::IrqEntry => self.enter(event, cpu, now, ExecutionMode::Irq, "irq_id"),
            StateEvent::SoftIrqEntry => {
                self.enter(event, cpu, now, ExecutionMode::SoftIrq, "softirq_id")
            }
            StateEvent::SyscallExit => self.leave(cpu, now, ExecutionMode::Syscall),
            StateEvent::TrapExit => self.leave(cpu, now, ExecutionMode::Trap),
            StateEvent::IrqExit => self.leave(cpu, now, ExecutionMode::Irq),
            StateEvent::SoftIrqExit => self.leave(cpu, now, ExecutionMode::SoftIrq),
            StateEvent::Schedule => self.schedule(event, cpu, now),
            StateEvent::Fork => self.fork(event, cpu, now),
            StateEvent::KernelThread => self.kernel_thread(event, cpu, now),
            StateEvent::Exit => self.exit(event, cpu),
            StateEvent::Exec => self.exec(event, cpu),
        }
    }

    fn submode(&self, mode: ExecutionMode, code: u64) -> Name {
        match mode {
            ExecutionMode::Syscall => self.names.syscall(code),
            ExecutionMode::Trap => self.names.trap(code),
            ExecutionMode::Irq => self.names.irq(code),
            ExecutionMode::SoftIrq => self.names.softirq(code),
            ExecutionMode::User | ExecutionMode::Unknown => SUBMODE_NONE.into(),
        }
    }

    fn enter(&mut self, event: &Event, cpu: Cpu, now: Timestamp, mode: ExecutionMode, field: &str) {
        let submode = match event.field_u64(field) {
            Some(code) => self.submode(mode, code),
            None => {
                debug!(trace = self.trace_index(), field, %mode, "mode entry without code");
                SUBMODE_NONE.into()
            }
        };
        let process = self.processes.running_mut(cpu);
        trace!(pid = process.pid, cpu, %mode, submode = %submode, "mode entry");
        process.push(mode, submode, now);
    }

    fn leave(&mut self, cpu: Cpu, now: Timestamp, mode: ExecutionMode) {
        let trace = self.trace_index();
        let process = self.processes.running_mut(cpu);
        match process.pop(mode, now) {
            Ok(()) => {}
            Err(PopRejected::BottomFrame) => {
                debug!(trace, pid = process.pid, cpu, %mode, "mode exit at bottom frame ignored");
            }
            Err(PopRejected::ModeMismatch { top, requested }) => {
                warn!(
                    trace,
                    pid = process.pid,
                    cpu,
                    %top,
                    %requested,
                    time = %now,
                    "mode exit does not match current mode, ignored"
                );
            }
        }
    }

    fn schedule(&mut self, event: &Event, cpu: Cpu, now: Timestamp) {
        let trace = self.trace_index();
        let (Some(pid_out), Some(pid_in)) = (pid_field(event, "prev_pid"), pid_field(event, "next_pid"))
        else {
            warn!(trace, cpu, time = %now, "schedule event without pids, ignored");
            return;
        };
        let prev_state = event.field_i64("prev_state").unwrap_or(TASK_RUNNING);

        if self.processes.running_pid(cpu).is_some_and(|pid| pid != pid_out) {
            debug!(trace, cpu, pid_out, "outgoing pid is not the one running on this cpu");
        }

        let mut retire = false;
        if let Some(out) = self.processes.get_mut(pid_out, cpu) {
            if out.pid == 0 && out.state().mode == ExecutionMode::Unknown {
                // First schedule-out of the idle task: it sits in a syscall.
                let state = out.state_mut();
                state.mode = ExecutionMode::Syscall;
                state.status = ProcessStatus::Wait;
                state.entry = now;
                state.change = now;
            } else if out.state().status == ProcessStatus::Exit {
                retire = true;
            } else {
                let state = out.state_mut();
                state.accrue(now);
                state.status = if prev_state == TASK_RUNNING {
                    ProcessStatus::WaitCpu
                } else {
                    ProcessStatus::Wait
                };
                state.change = now;
            }
        }
        if retire {
            self.processes.remove(pid_out, cpu);
            debug!(trace, pid = pid_out, cpu, time = %now, "exited process retired");
        }

        let incoming = self.processes.find_or_create(pid_in, cpu, now);
        incoming.cpu = cpu;
        let state = incoming.state_mut();
        state.accrue(now);
        state.status = ProcessStatus::Run;
        state.change = now;
        self.processes.set_running(cpu, pid_in);
        trace!(trace, cpu, pid_out, pid_in, prev_state, "schedule");
    }

    fn fork(&mut self, event: &Event, cpu: Cpu, now: Timestamp) {
        let trace = self.trace_index();
        let (Some(parent), Some(child)) = (pid_field(event, "parent_pid"), pid_field(event, "child_pid"))
        else {
            warn!(trace, cpu, time = %now, "fork event without pids, ignored");
            return;
        };
        let tgid = pid_field(event, "child_tgid").unwrap_or(child);
        let parent_name = self.processes.get(parent, cpu).map(|p| p.name.clone());

        if let Some(existing) = self.processes.get_mut(child, cpu) {
            // Scheduled in before its fork was seen, clocks of other CPUs
            // being slightly ahead.
            debug!(trace, pid = child, parent, "fork of a process already seen");
            existing.ppid = parent;
            existing.tgid = tgid;
            existing.creation_time = now;
            if let Some(name) = parent_name {
                if existing.name.as_str() == UNNAMED {
                    existing.name = name;
                }
            }
            return;
        }

        let process = self.processes.create(Some(parent), child, tgid, cpu, now);
        if let Some(name) = parent_name {
            process.name = name;
        }
    }

    fn kernel_thread(&mut self, event: &Event, cpu: Cpu, now: Timestamp) {
        let Some(pid) = pid_field(event, "pid") else {
            warn!(trace = self.trace_index(), cpu, "kernel thread event without pid, ignored");
            return;
        };
        let process = self.processes.find_or_create(pid, cpu, now);
        let status = process.state().status;
        process.reset_stack(ExecutionState::new(
            ExecutionMode::Syscall,
            SUBMODE_NONE.into(),
            status,
            now,
        ));
        process.kind = ProcessType::KernelThread;
    }

    fn exit(&mut self, event: &Event, cpu: Cpu) {
        let pid = pid_field(event, "pid").or_else(|| self.processes.running_pid(cpu));
        match pid.and_then(|pid| self.processes.get_mut(pid, cpu)) {
            // Removal waits for the next schedule-out.
            Some(process) => process.state_mut().status = ProcessStatus::Exit,
            None => debug!(trace = self.trace_index(), ?pid, cpu, "exit of unknown process"),
        }
    }

    fn exec(&mut self, event: &Event, cpu: Cpu) {
        let Some(filename) = event.field_str("filename") else {
            warn!(trace = self.trace_index(), cpu, "exec event without filename, ignored");
            return;
        };
        let process = self.processes.running_mut(cpu);
        debug!(pid = process.pid, name = filename, "process renamed by exec");
        process.name = Name::from(filename);
    }
}
