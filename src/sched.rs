//! Process scheduler
//!
//! All queues live behind one mutex; every operation is a short critical
//! section that never waits for a process to become ready.

use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::config::{Config, SchedPolicy};
use crate::error::{Error, Result};
use crate::memphy::lock;
use crate::proc::Pcb;
use crate::queue::Queue;

/// Ready queue of one priority level in multi-level mode
#[derive(Debug)]
struct MlqLevel {
    queue: Queue,
    /// Dispatches left before the next reset
    slot: usize,
    budget: usize,
}

#[derive(Debug)]
struct SchedState {
    ready_queue: Queue,
    mlq_ready_queue: Vec<MlqLevel>,
    /// Every admitted process that has not finished or been killed
    running_list: Queue,
}

/// Processes removed by name
#[derive(Debug, Default)]
pub struct Removed {
    /// Matches found in the roster
    pub roster: Vec<Arc<Pcb>>,
    /// Matches that were waiting in a ready queue, i.e. not on a CPU
    pub queued: Vec<Arc<Pcb>>,
}

#[derive(Debug)]
pub struct Scheduler {
    policy: SchedPolicy,
    state: Mutex<SchedState>,
}

impl Scheduler {
    pub fn init(config: &Config) -> Self {
        let mlq_ready_queue = match config.policy {
            SchedPolicy::MultiLevel => (0..config.max_prio)
                .map(|level| MlqLevel {
                    queue: Queue::new(config.queue_capacity),
                    slot: config.slot_budget(level),
                    budget: config.slot_budget(level),
                })
                .collect(),
            SchedPolicy::Priority => Vec::new(),
        };
        Scheduler {
            policy: config.policy,
            state: Mutex::new(SchedState {
                ready_queue: Queue::new(config.queue_capacity),
                mlq_ready_queue,
                running_list: Queue::new(config.queue_capacity),
            }),
        }
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Admit a new process: record it in the roster and make it ready.
    pub fn admit(&self, proc: Arc<Pcb>) -> Result<()> {
        let mut st = lock(&self.state);
        if st.running_list.is_full() {
            warn!("roster full ({} processes), rejecting pid {}", st.running_list.capacity(), proc.pid());
            return Err(Error::QueueFull);
        }
        st.ready_queue_for(self.policy, &proc)?.enqueue(proc.clone())?;
        st.running_list.enqueue(proc)
    }

    /// Put a process that used up its time slice back in its ready queue.
    pub fn requeue(&self, proc: Arc<Pcb>) -> Result<()> {
        let mut st = lock(&self.state);
        st.ready_queue_for(self.policy, &proc)?.enqueue(proc)
    }

    /// Next process to run, or `None` when nothing is ready.
    pub fn get_next(&self) -> Option<Arc<Pcb>> {
        let mut st = lock(&self.state);
        let proc = match self.policy {
            SchedPolicy::Priority => st.ready_queue.dequeue(),
            SchedPolicy::MultiLevel => st.get_mlq_proc(),
        };
        if let Some(p) = &proc {
            debug!("dispatch pid {} ({}) prio {}", p.pid(), p.path(), p.priority());
        }
        proc
    }

    /// Drop a process that ran to completion from the roster.
    pub fn finish(&self, proc: &Pcb) {
        let pid = proc.pid();
        lock(&self.state).running_list.remove_where(|p| p.pid() == pid);
    }

    /// Remove every process called `name` from the roster and all ready queues.
    pub fn remove_by_name(&self, name: &str) -> Removed {
        let mut st = lock(&self.state);
        let roster = st.running_list.remove_where(|p| p.path() == name);
        let mut queued = st.ready_queue.remove_where(|p| p.path() == name);
        for level in &mut st.mlq_ready_queue {
            queued.extend(level.queue.remove_where(|p| p.path() == name));
        }
        Removed { roster, queued }
    }

    /// True when every ready queue is empty
    pub fn is_idle(&self) -> bool {
        let st = lock(&self.state);
        st.ready_queue.is_empty() && st.mlq_ready_queue.iter().all(|l| l.queue.is_empty())
    }

    /// Snapshot of the roster in admission order
    pub fn roster(&self) -> Vec<Arc<Pcb>> {
        lock(&self.state).running_list.iter().cloned().collect()
    }

    pub fn roster_is_empty(&self) -> bool {
        lock(&self.state).running_list.is_empty()
    }

    /// Remaining slice of every level, highest priority first
    pub fn slots(&self) -> Vec<usize> {
        lock(&self.state).mlq_ready_queue.iter().map(|l| l.slot).collect()
    }

    /// Empty every queue and the roster, returning the processes still admitted.
    pub fn shutdown(&self) -> Vec<Arc<Pcb>> {
        let mut st = lock(&self.state);
        st.ready_queue.drain();
        for level in &mut st.mlq_ready_queue {
            level.queue.drain();
            level.slot = level.budget;
        }
        st.running_list.drain()
    }
}

impl SchedState {
    fn ready_queue_for(&mut self, policy: SchedPolicy, proc: &Pcb) -> Result<&mut Queue> {
        match policy {
            SchedPolicy::Priority => Ok(&mut self.ready_queue),
            SchedPolicy::MultiLevel => self
                .mlq_ready_queue
                .get_mut(proc.priority())
                .map(|level| &mut level.queue)
                .ok_or(Error::InvalidPriority(proc.priority())),
        }
    }

    /// Head of the highest non-empty level that still has slice left. When
    /// every non-empty level is out of slice, all slices reset and the scan
    /// runs once more.
    fn get_mlq_proc(&mut self) -> Option<Arc<Pcb>> {
        if let Some(proc) = self.take_from_levels() {
            return Some(proc);
        }
        if self.mlq_ready_queue.iter().all(|l| l.queue.is_empty()) {
            return None;
        }
        debug!("all time slices used, resetting");
        for level in &mut self.mlq_ready_queue {
            level.slot = level.budget;
        }
        self.take_from_levels()
    }

    fn take_from_levels(&mut self) -> Option<Arc<Pcb>> {
        let level = self
            .mlq_ready_queue
            .iter_mut()
            .find(|l| !l.queue.is_empty() && l.slot > 0)?;
        level.slot -= 1;
        level.queue.dequeue()
    }
}
