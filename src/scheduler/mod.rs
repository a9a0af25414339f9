//! Process schedulers.
//!
//! Two implementations of [`Scheduler`]: a single-FIFO
//! [`round_robin::RoundRobinScheduler`] and a 32-level aging
//! [`priority::PriorityScheduler`]. The host owns the canonical
//! [`ProcessDescriptor`] and hands it to `add_process` by value; from that
//! point the scheduler is the sole keeper of its scheduling-relevant fields
//! (queue placement, remaining slice, age) until `remove_process` releases
//! the pid.

pub mod priority;
pub mod round_robin;

pub use priority::PriorityScheduler;
pub use round_robin::RoundRobinScheduler;

use crate::host::PrintSink;

pub type Pid = u32;

pub const MAX_PRIORITY: u8 = 31;
pub const DEFAULT_PRIORITY: u8 = 15;
pub const AGING_INTERVAL: u32 = 100;
pub const AGING_BOOST: u8 = 1;

pub const DEFAULT_TIME_QUANTUM: u32 = 20;
pub const MIN_TIME_QUANTUM: u32 = 1;
pub const MAX_TIME_QUANTUM: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
}

/// Scheduling-relevant state for one process. Created and keyed by the host;
/// enrolled into a scheduler via [`Scheduler::add_process`], which takes it
/// by value, and handed back out of scope only via
/// [`Scheduler::remove_process`].
#[derive(Debug, Clone)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    pub priority: u8,
    pub original_priority: u8,
    pub age: u32,
    pub time_slice: u32,
    pub remaining_slice: u32,
    pub state: ProcessState,
}

impl ProcessDescriptor {
    /// Builds a fresh, unscheduled descriptor. `priority` is clamped to
    /// [`DEFAULT_PRIORITY`] if out of range; the priority scheduler is the
    /// only implementation that gives this field meaning.
    pub fn new(pid: Pid, priority: u8) -> Self {
        let priority = if priority > MAX_PRIORITY {
            DEFAULT_PRIORITY
        } else {
            priority
        };
        ProcessDescriptor {
            pid,
            priority,
            original_priority: priority,
            age: 0,
            time_slice: 0,
            remaining_slice: 0,
            state: ProcessState::Ready,
        }
    }
}

/// The uniform capability every scheduler implementation exposes through the
/// registry.
pub trait Scheduler {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    fn init(&mut self) -> i32;
    fn shutdown(&mut self);

    /// Enrolls `process`, initially ready. Takes ownership — see the module
    /// doc comment.
    fn add_process(&mut self, process: ProcessDescriptor);

    /// Detaches `pid` unconditionally from whichever of {ready, blocked,
    /// current} holds it. A no-op if `pid` is not enrolled.
    fn remove_process(&mut self, pid: Pid);

    /// Pops and returns the next process to run without otherwise changing
    /// scheduler state (no context-switch bookkeeping). `None` if nothing is
    /// ready.
    fn get_next(&mut self) -> Option<Pid>;

    /// Makes a scheduling decision: if the current process is absent or has
    /// exhausted its slice, selects a new one. Returns the (possibly
    /// unchanged) current pid.
    fn schedule(&mut self) -> Option<Pid>;

    /// Forces the current process to give up the rest of its slice and
    /// reschedules immediately.
    fn yield_current(&mut self);

    fn block(&mut self, pid: Pid);
    fn unblock(&mut self, pid: Pid);

    fn timer_tick(&mut self);

    fn get_time_slice(&self, pid: Pid) -> u32;

    /// Sets `pid`'s priority. Returns `0` on success, `-1` if `priority` is
    /// out of range or `pid` is not enrolled. A no-op (but still success) on
    /// implementations that don't use priority.
    fn set_priority(&mut self, pid: Pid, priority: u8) -> i32;

    /// Returns `pid`'s priority, or `-1` if not enrolled.
    fn get_priority(&self, pid: Pid) -> i32;

    fn print_stats(&self, sink: &mut dyn PrintSink);

    fn get_context_switches(&self) -> u32;
    fn get_avg_wait_time(&self) -> u32;
}
