use std::sync::Arc;

use crate::error::{Error, Result};
use crate::proc::Pcb;

/// Fixed-capacity process queue.
///
/// Processes are kept in insertion order; `dequeue` removes the one with the
/// lowest priority value, the earliest inserted among equals.
#[derive(Debug)]
pub struct Queue {
    procs: Vec<Arc<Pcb>>,
    capacity: usize,
}

impl Queue {
    pub fn new(capacity: usize) -> Self {
        Queue { procs: Vec::with_capacity(capacity), capacity }
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.procs.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&mut self, proc: Arc<Pcb>) -> Result<()> {
        if self.is_full() {
            return Err(Error::QueueFull);
        }
        self.procs.push(proc);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<Arc<Pcb>> {
        let (idx, _) = self
            .procs
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (p.priority(), *i))?;
        Some(self.procs.remove(idx))
    }

    /// Remove every process matching `pred`, keeping the others in order.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Pcb) -> bool) -> Vec<Arc<Pcb>> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.capacity);
        for proc in self.procs.drain(..) {
            if pred(&proc) {
                removed.push(proc);
            } else {
                kept.push(proc);
            }
        }
        self.procs = kept;
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Pcb>> {
        self.procs.iter()
    }

    /// Empty the queue, returning its contents in order
    pub fn drain(&mut self) -> Vec<Arc<Pcb>> {
        std::mem::take(&mut self.procs)
    }
}
