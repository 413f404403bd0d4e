pub mod config;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod io;
pub mod libmem;
pub mod memphy;
pub mod proc;
pub mod pte;
pub mod queue;
pub mod sched;
pub mod swap;
pub mod syscall;
pub mod translation;
pub mod vm;

// Re-export commonly used items for convenience
pub use config::{Config, SchedPolicy};
pub use constants::*;
pub use error::{Error, Result};
pub use memphy::{MemPhy, SharedMemPhy};
pub use proc::{Instruction, Pcb};
pub use sched::Scheduler;
pub use translation::VirtualAddress;
