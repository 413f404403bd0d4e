use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::Config;
use crate::memphy::{lock, SharedMemPhy};
use crate::vm::MmStruct;

/// One simulated instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Pure computation, touches no memory
    Calc,
    Alloc { size: usize, reg: usize },
    Free { reg: usize },
    Read { reg: usize, offset: usize },
    Write { value: u8, reg: usize, offset: usize },
    /// Terminate every process named by the string stored in region `reg`
    KillAll { reg: usize },
}

/// Process control block
///
/// Shared by reference (`Arc<Pcb>`) between the scheduler queues and the worker
/// running it. The address space sits behind its own lock, which is the
/// allocation lock for that process.
pub struct Pcb {
    pid: u32,
    path: String,
    priority: usize,
    code: Vec<Instruction>,
    pc: AtomicUsize,
    killed: AtomicBool,
    /// Dump page table and RAM after memory syscalls
    pub(crate) dump: bool,
    pub(crate) mm: Mutex<MmStruct>,
    pub(crate) mram: SharedMemPhy,
    pub(crate) active_mswp: SharedMemPhy,
    output: Mutex<Vec<String>>,
}

impl Pcb {
    pub fn new(
        pid: u32,
        path: impl Into<String>,
        priority: usize,
        code: Vec<Instruction>,
        config: &Config,
        mram: SharedMemPhy,
        active_mswp: SharedMemPhy,
    ) -> Self {
        Pcb {
            pid,
            path: path.into(),
            priority,
            code,
            pc: AtomicUsize::new(0),
            killed: AtomicBool::new(false),
            dump: config.dump,
            mm: Mutex::new(MmStruct::new(config)),
            mram,
            active_mswp,
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lower value means more urgent
    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn pc(&self) -> usize {
        self.pc.load(Ordering::Acquire)
    }

    /// Next instruction, advancing the program counter
    pub fn fetch(&self) -> Option<Instruction> {
        let pc = self.pc.load(Ordering::Acquire);
        let ins = self.code.get(pc).copied()?;
        self.pc.store(pc + 1, Ordering::Release);
        Some(ins)
    }

    pub fn is_finished(&self) -> bool {
        self.pc() >= self.code.len()
    }

    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn with_mm<R>(&self, f: impl FnOnce(&MmStruct) -> R) -> R {
        f(&lock(&self.mm))
    }

    pub(crate) fn record(&self, line: String) {
        lock(&self.output).push(line);
    }

    /// Lines recorded by read instructions, oldest first
    pub fn output(&self) -> Vec<String> {
        lock(&self.output).clone()
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("pid", &self.pid)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("pc", &self.pc())
            .finish()
    }
}
