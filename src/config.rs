use crate::constants::*;

/// Ready-queue organisation used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// One ready queue ordered by priority value.
    Priority,
    /// One queue per priority level, each with its own time-slice budget.
    MultiLevel,
}

/// Runtime configuration of the simulated machine
#[derive(Debug, Clone)]
pub struct Config {
    /// Frames of simulated RAM
    pub ram_frames: usize,
    /// Slots of the active swap device
    pub swap_slots: usize,
    /// Number of priority levels in multi-level mode
    pub max_prio: usize,
    /// Capacity of every scheduler queue, the roster included
    pub queue_capacity: usize,
    /// Symbol-table entries per address space
    pub symtbl_size: usize,
    /// Start address of VMA 1
    pub heap_base: usize,
    pub policy: SchedPolicy,
    /// Worker threads executing processes
    pub cpus: usize,
    /// Instructions executed per dispatch
    pub time_slice: usize,
    /// Dump page table and RAM after each memory syscall
    pub dump: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ram_frames: DEFAULT_RAM_FRAMES,
            swap_slots: DEFAULT_SWAP_SLOTS,
            max_prio: DEFAULT_MAX_PRIO,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            symtbl_size: DEFAULT_SYMTBL_SIZE,
            heap_base: DEFAULT_HEAP_BASE,
            policy: SchedPolicy::MultiLevel,
            cpus: DEFAULT_CPUS,
            time_slice: DEFAULT_TIME_SLICE,
            dump: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        let field_max = PTE_FIELD_MASK as usize + 1;
        if self.ram_frames == 0 || self.ram_frames > field_max {
            return Err(format!("RAM frame count {} must be in 1..={}", self.ram_frames, field_max));
        }
        if self.swap_slots == 0 || self.swap_slots > field_max {
            return Err(format!("Swap slot count {} must be in 1..={}", self.swap_slots, field_max));
        }
        if self.max_prio == 0 {
            return Err("Priority level count must be positive".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("Queue capacity must be positive".to_string());
        }
        if self.symtbl_size == 0 {
            return Err("Symbol table size must be positive".to_string());
        }
        if self.heap_base % PAGE_SIZE != 0 || self.heap_base < PAGE_SIZE || self.heap_base >= MAX_VA {
            return Err(format!(
                "Heap base {:#x} must be page aligned and in [{:#x}, {:#x})",
                self.heap_base, PAGE_SIZE, MAX_VA
            ));
        }
        if self.cpus == 0 {
            return Err("At least one CPU is required".to_string());
        }
        if self.time_slice == 0 {
            return Err("Time slice must be positive".to_string());
        }
        Ok(())
    }

    /// Slice budget of a multi-level queue; higher priority gets more turns.
    #[inline]
    pub fn slot_budget(&self, level: usize) -> usize {
        self.max_prio - level
    }
}
