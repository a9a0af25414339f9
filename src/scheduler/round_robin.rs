//! Classic time-sliced round-robin scheduler with a configurable quantum.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{
    Pid, ProcessDescriptor, ProcessState, Scheduler, DEFAULT_TIME_QUANTUM, MAX_TIME_QUANTUM,
    MIN_TIME_QUANTUM,
};
use crate::host::PrintSink;

pub struct RoundRobinScheduler {
    ready_queue: VecDeque<Pid>,
    blocked: BTreeSet<Pid>,
    descriptors: BTreeMap<Pid, ProcessDescriptor>,
    current: Option<Pid>,
    time_quantum: u32,
    remaining_quantum: u32,
    context_switches: u32,
    total_wait_time: u32,
    current_tick: u32,
    initialized: bool,
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        RoundRobinScheduler {
            ready_queue: VecDeque::new(),
            blocked: BTreeSet::new(),
            descriptors: BTreeMap::new(),
            current: None,
            time_quantum: DEFAULT_TIME_QUANTUM,
            remaining_quantum: 0,
            context_switches: 0,
            total_wait_time: 0,
            current_tick: 0,
            initialized: false,
        }
    }

    pub fn with_time_quantum(quantum: u32) -> Self {
        let mut scheduler = Self::new();
        scheduler.set_time_quantum(quantum);
        scheduler
    }

    pub fn set_time_quantum(&mut self, quantum: u32) {
        if (MIN_TIME_QUANTUM..=MAX_TIME_QUANTUM).contains(&quantum) {
            self.time_quantum = quantum;
            if self.current.is_some() && self.remaining_quantum > 0 {
                self.remaining_quantum = quantum;
            }
        }
    }

    pub fn get_time_quantum(&self) -> u32 {
        self.time_quantum
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    fn pop_ready(&mut self) -> Option<Pid> {
        self.ready_queue.pop_front()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn description(&self) -> &'static str {
        "Classic time-sliced round-robin scheduler with configurable quantum"
    }

    fn init(&mut self) -> i32 {
        if self.initialized {
            return 0;
        }
        let time_quantum = self.time_quantum;
        *self = RoundRobinScheduler {
            time_quantum,
            initialized: true,
            ..RoundRobinScheduler::new()
        };
        0
    }

    fn shutdown(&mut self) {
        self.ready_queue.clear();
        self.blocked.clear();
        self.descriptors.clear();
        self.current = None;
        self.initialized = false;
    }

    fn add_process(&mut self, process: ProcessDescriptor) {
        let pid = process.pid;
        self.descriptors.insert(pid, process);
        self.ready_queue.push_back(pid);
    }

    fn remove_process(&mut self, pid: Pid) {
        if self.descriptors.remove(&pid).is_none() {
            return;
        }
        self.ready_queue.retain(|&p| p != pid);
        self.blocked.remove(&pid);
        if self.current == Some(pid) {
            self.current = None;
            self.remaining_quantum = 0;
        }
    }

    fn get_next(&mut self) -> Option<Pid> {
        self.pop_ready()
    }

    fn schedule(&mut self) -> Option<Pid> {
        if self.current.is_none() || self.remaining_quantum == 0 {
            if let Some(current) = self.current {
                if self.remaining_quantum == 0 {
                    self.ready_queue.push_back(current);
                }
            }

            let next = self.pop_ready();
            if next != self.current {
                self.current = next;
                self.remaining_quantum = self.time_quantum;
                self.context_switches += 1;
            }
        }
        self.current
    }

    fn yield_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.ready_queue.push_back(current);
            self.remaining_quantum = 0;
        }
        self.schedule();
    }

    fn block(&mut self, pid: Pid) {
        if !self.descriptors.contains_key(&pid) {
            return;
        }
        let was_current = self.current == Some(pid);
        if was_current {
            self.current = None;
            self.remaining_quantum = 0;
        } else {
            self.ready_queue.retain(|&p| p != pid);
        }
        self.blocked.insert(pid);
        if let Some(descriptor) = self.descriptors.get_mut(&pid) {
            descriptor.state = ProcessState::Blocked;
        }
        if was_current {
            self.schedule();
        }
    }

    fn unblock(&mut self, pid: Pid) {
        if !self.blocked.remove(&pid) {
            return;
        }
        self.ready_queue.push_back(pid);
        if let Some(descriptor) = self.descriptors.get_mut(&pid) {
            descriptor.state = ProcessState::Ready;
        }
    }

    fn timer_tick(&mut self) {
        self.current_tick += 1;
        if self.current.is_some() && self.remaining_quantum > 0 {
            self.remaining_quantum -= 1;
        }
        self.total_wait_time += self.ready_queue.len() as u32;
        if self.remaining_quantum == 0 {
            self.schedule();
        }
    }

    fn get_time_slice(&self, _pid: Pid) -> u32 {
        // Every process gets the same slice under round-robin.
        self.time_quantum
    }

    fn set_priority(&mut self, _pid: Pid, _priority: u8) -> i32 {
        // Accepted but inert: round-robin doesn't schedule by priority.
        0
    }

    fn get_priority(&self, pid: Pid) -> i32 {
        if self.descriptors.contains_key(&pid) {
            0
        } else {
            -1
        }
    }

    fn print_stats(&self, sink: &mut dyn PrintSink) {
        sink.print_line("ROUND-ROBIN SCHEDULER STATISTICS:");
        sink.print_line(&alloc::format!(
            "  Total processes: {}",
            self.descriptors.len()
        ));
        sink.print_line(&alloc::format!(
            "  Context switches: {}",
            self.context_switches
        ));
        sink.print_line(&alloc::format!("  Time quantum: {} ticks", self.time_quantum));
        sink.print_line(&alloc::format!("  Current tick: {}", self.current_tick));
        if self.current_tick > 0 {
            sink.print_line(&alloc::format!(
                "  Average wait time: {:.2} ticks",
                self.total_wait_time as f64 / self.current_tick as f64
            ));
        }
        sink.print_line(&alloc::format!("  Ready processes: {}", self.ready_queue.len()));
        sink.print_line(&alloc::format!("  Blocked processes: {}", self.blocked.len()));
        match self.current {
            Some(pid) => sink.print_line(&alloc::format!(
                "  Current process: PID {}, Remaining quantum: {}",
                pid,
                self.remaining_quantum
            )),
            None => sink.print_line("  Current process: None"),
        }
    }

    fn get_context_switches(&self) -> u32 {
        self.context_switches
    }

    fn get_avg_wait_time(&self) -> u32 {
        if self.current_tick == 0 {
            0
        } else {
            self.total_wait_time / self.current_tick
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn fresh_scheduler_dispatches_in_enrollment_order() {
        let mut scheduler = RoundRobinScheduler::new();
        scheduler.init();
        scheduler.add_process(ProcessDescriptor::new(1, 0));
        scheduler.add_process(ProcessDescriptor::new(2, 0));

        assert_eq!(scheduler.schedule(), Some(1));
        assert_eq!(scheduler.get_context_switches(), 1);
    }

    #[test]
    fn remove_process_is_unconditional() {
        let mut scheduler = RoundRobinScheduler::new();
        scheduler.init();
        scheduler.add_process(ProcessDescriptor::new(1, 0));
        scheduler.add_process(ProcessDescriptor::new(2, 0));
        scheduler.schedule(); // dispatches 1
        scheduler.remove_process(1); // removes the running process
        assert_eq!(scheduler.current_pid(), None);
        scheduler.remove_process(2); // removes a merely-ready process
        assert_eq!(scheduler.schedule(), None);
    }

    #[test]
    fn block_and_unblock_round_trip() {
        let mut scheduler = RoundRobinScheduler::new();
        scheduler.init();
        scheduler.add_process(ProcessDescriptor::new(1, 0));
        scheduler.add_process(ProcessDescriptor::new(2, 0));
        scheduler.schedule(); // current = 1

        scheduler.block(1);
        assert_eq!(scheduler.current_pid(), Some(2));

        scheduler.unblock(1);
        scheduler.remove_process(2);
        assert_eq!(scheduler.schedule(), Some(1));
    }

    #[test]
    fn scenario_s3_round_robin_fairness() {
        // S3: quantum 5, three processes, tick until quantum boundaries
        // force five dispatches; order P1,P2,P3,P1,P2, five context switches.
        let mut scheduler = RoundRobinScheduler::with_time_quantum(5);
        scheduler.init();
        scheduler.add_process(ProcessDescriptor::new(1, 0));
        scheduler.add_process(ProcessDescriptor::new(2, 0));
        scheduler.add_process(ProcessDescriptor::new(3, 0));

        let mut dispatch_order: Vec<Pid> = Vec::new();
        let mut last = None;
        for _ in 0..100 {
            scheduler.timer_tick();
            let current = scheduler.current_pid();
            if current != last {
                if let Some(pid) = current {
                    dispatch_order.push(pid);
                }
                last = current;
            }
            if dispatch_order.len() == 5 {
                break;
            }
        }

        assert_eq!(dispatch_order, vec![1, 2, 3, 1, 2]);
        assert_eq!(scheduler.get_context_switches(), 5);
    }
}
