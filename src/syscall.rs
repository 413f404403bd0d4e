use log::info;

use crate::error::Result;
use crate::libmem::{self, DEFAULT_VMA};
use crate::proc::Pcb;
use crate::sched::Scheduler;

/// Byte ending a name stored in process memory (-1 as a signed byte)
pub const NAME_TERMINATOR: u8 = 0xff;

/// Read a terminated name out of the region bound to `handle`. Stops at the
/// terminator, a nul byte or the end of the region.
pub fn read_name(proc: &Pcb, handle: usize) -> Result<String> {
    let len = proc.with_mm(|mm| mm.symbol(handle).map(|e| e.region.len()))?;
    let mut bytes = Vec::new();
    for offset in 0..len {
        match libmem::read_in_vma(proc, DEFAULT_VMA, handle, offset)? {
            NAME_TERMINATOR | 0 => break,
            b => bytes.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Terminate every process whose name is stored in the caller's region `name_handle`.
///
/// Matches leave the roster and every ready queue, survivors keep their order.
/// Matches that were waiting in a queue release their memory here; a match
/// that is on a CPU, the caller included, is stopped by its worker.
/// Returns the number of processes terminated.
pub fn sys_killall(caller: &Pcb, sched: &Scheduler, name_handle: usize) -> Result<usize> {
    let name = read_name(caller, name_handle)?;
    info!("pid {}: killall \"{}\" (region {})", caller.pid(), name, name_handle);

    let removed = sched.remove_by_name(&name);
    for proc in removed.roster.iter().chain(&removed.queued) {
        proc.kill();
    }
    for proc in &removed.queued {
        libmem::release_memory(proc);
    }
    Ok(removed.roster.len())
}
