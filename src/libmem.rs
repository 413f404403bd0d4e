//! Memory syscalls of a process
//!
//! Each call takes the process's address-space lock for its whole duration
//! (region search, VMA growth and any page fault it triggers), then RAM, then
//! swap. The guards are released on every path when they go out of scope.

use log::{info, warn};

use crate::error::{Error, Result};
use crate::memphy::lock;
use crate::proc::Pcb;
use crate::swap;
use crate::translation::{pg_getval, pg_setval};
use crate::vm::{MmStruct, VmRegion};

/// VMA used by the syscall-level entry points
pub const DEFAULT_VMA: usize = 0;

fn region_address(mm: &MmStruct, vmaid: usize, handle: usize, offset: usize) -> Result<usize> {
    mm.vma(vmaid)?;
    let entry = mm.symbol(handle)?;
    if entry.vmaid != vmaid {
        return Err(Error::InvalidHandle(handle));
    }
    if offset >= entry.region.len() {
        return Err(Error::OffsetOutOfRange { handle, offset, len: entry.region.len() });
    }
    Ok(entry.region.start + offset)
}

pub fn alloc_in_vma(proc: &Pcb, vmaid: usize, handle: usize, size: usize) -> Result<usize> {
    lock(&proc.mm).alloc(vmaid, handle, size)
}

pub fn free_handle(proc: &Pcb, handle: usize) -> Result<VmRegion> {
    lock(&proc.mm).free(handle)
}

pub fn read_in_vma(proc: &Pcb, vmaid: usize, handle: usize, offset: usize) -> Result<u8> {
    let mut mm = lock(&proc.mm);
    let va = region_address(&mm, vmaid, handle, offset)?;
    let mut ram = lock(&proc.mram);
    let mut swp = lock(&proc.active_mswp);
    pg_getval(&mut mm, va, &mut ram, &mut swp)
}

pub fn write_in_vma(proc: &Pcb, vmaid: usize, handle: usize, offset: usize, value: u8) -> Result<()> {
    let mut mm = lock(&proc.mm);
    let va = region_address(&mm, vmaid, handle, offset)?;
    let mut ram = lock(&proc.mram);
    let mut swp = lock(&proc.active_mswp);
    pg_setval(&mut mm, va, value, &mut ram, &mut swp)
}

/// Log the page table and RAM contents when the process runs in dump mode
fn dump_state(proc: &Pcb) {
    if !proc.dump {
        return;
    }
    let mm = lock(&proc.mm);
    info!("{}", mm.dump_page_table());
    info!("{}", lock(&proc.mram).dump());
}

/// Allocate `size` bytes and bind them to `handle`; returns the start address.
pub fn alloc(proc: &Pcb, size: usize, handle: usize) -> Result<usize> {
    let result = alloc_in_vma(proc, DEFAULT_VMA, handle, size);
    match &result {
        Ok(addr) => info!("pid {}: allocated region={} size={} addr={:#x}", proc.pid(), handle, size, addr),
        Err(e) => warn!("pid {}: alloc region={} size={} failed: {}", proc.pid(), handle, size, e),
    }
    dump_state(proc);
    result
}

pub fn free(proc: &Pcb, handle: usize) -> Result<()> {
    let result = free_handle(proc, handle);
    match &result {
        Ok(rg) => info!("pid {}: freed region={} [{:#x}, {:#x})", proc.pid(), handle, rg.start, rg.end),
        Err(e) => warn!("pid {}: free region={} failed: {}", proc.pid(), handle, e),
    }
    dump_state(proc);
    result.map(|_| ())
}

pub fn read(proc: &Pcb, handle: usize, offset: usize) -> Result<u8> {
    let result = read_in_vma(proc, DEFAULT_VMA, handle, offset);
    match &result {
        Ok(value) => info!("pid {}: read region={} offset={} value={}", proc.pid(), handle, offset, value),
        Err(e) => warn!("pid {}: read region={} offset={} failed: {}", proc.pid(), handle, offset, e),
    }
    dump_state(proc);
    result
}

pub fn write(proc: &Pcb, handle: usize, offset: usize, value: u8) -> Result<()> {
    let result = write_in_vma(proc, DEFAULT_VMA, handle, offset, value);
    match &result {
        Ok(()) => info!("pid {}: write region={} offset={} value={}", proc.pid(), handle, offset, value),
        Err(e) => warn!("pid {}: write region={} offset={} failed: {}", proc.pid(), handle, offset, e),
    }
    dump_state(proc);
    result
}

/// Give back every frame and swap slot the process owns. Safe to call twice.
pub fn release_memory(proc: &Pcb) -> (usize, usize) {
    let mut mm = lock(&proc.mm);
    let mut ram = lock(&proc.mram);
    let mut swp = lock(&proc.active_mswp);
    let (frames, slots) = swap::release_all(&mut mm, &mut ram, &mut swp);
    if frames + slots > 0 {
        info!("pid {}: released {} frames, {} swap slots", proc.pid(), frames, slots);
    }
    (frames, slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::constants::PAGE_SIZE;
    use crate::memphy::{MemPhy, SharedMemPhy};
    use std::sync::Arc;

    fn pcb_with(pid: u32, ram: &SharedMemPhy, swp: &SharedMemPhy) -> Pcb {
        Pcb::new(pid, "p", 0, Vec::new(), &Config::default(), ram.clone(), swp.clone())
    }

    #[test]
    fn test_read_write_round_trip_with_eviction() {
        let ram = MemPhy::shared(2);
        let swp = MemPhy::shared(8);
        let proc = pcb_with(1, &ram, &swp);

        // Four pages backed by two frames
        let size = 4 * PAGE_SIZE;
        assert_eq!(alloc(&proc, size, 0), Ok(0));
        for off in 0..size {
            write(&proc, 0, off, (off * 7 % 256) as u8).unwrap();
        }
        for off in 0..size {
            assert_eq!(read(&proc, 0, off), Ok((off * 7 % 256) as u8), "offset {}", off);
        }
    }

    #[test]
    fn test_last_write_wins() {
        let ram = MemPhy::shared(4);
        let swp = MemPhy::shared(4);
        let proc = pcb_with(1, &ram, &swp);

        alloc(&proc, 10, 3).unwrap();
        write(&proc, 3, 9, 1).unwrap();
        write(&proc, 3, 9, 2).unwrap();
        assert_eq!(read(&proc, 3, 9), Ok(2));
    }

    #[test]
    fn test_offset_bounds_checked() {
        let ram = MemPhy::shared(4);
        let swp = MemPhy::shared(4);
        let proc = pcb_with(1, &ram, &swp);

        alloc(&proc, 10, 0).unwrap();
        assert_eq!(read(&proc, 0, 10), Err(Error::OffsetOutOfRange { handle: 0, offset: 10, len: 10 }));
        assert!(write(&proc, 0, 100, 1).is_err());
    }

    #[test]
    fn test_unbound_handle() {
        let ram = MemPhy::shared(4);
        let swp = MemPhy::shared(4);
        let proc = pcb_with(1, &ram, &swp);

        assert_eq!(read(&proc, 0, 0), Err(Error::InvalidHandle(0)));
        alloc(&proc, 8, 0).unwrap();
        free(&proc, 0).unwrap();
        assert_eq!(write(&proc, 0, 0, 1), Err(Error::InvalidHandle(0)));
        assert_eq!(free(&proc, 0), Err(Error::InvalidHandle(0)));
    }

    #[test]
    fn test_handle_vma_mismatch() {
        let ram = MemPhy::shared(4);
        let swp = MemPhy::shared(4);
        let proc = pcb_with(1, &ram, &swp);

        alloc_in_vma(&proc, 1, 0, 8).unwrap();
        assert_eq!(read_in_vma(&proc, 0, 0, 0), Err(Error::InvalidHandle(0)));
        write_in_vma(&proc, 1, 0, 0, 5).unwrap();
        assert_eq!(read_in_vma(&proc, 1, 0, 0), Ok(5));
    }

    #[test]
    fn test_processes_share_ram() {
        let ram = MemPhy::shared(2);
        let swp = MemPhy::shared(4);
        let a = pcb_with(1, &ram, &swp);
        let b = pcb_with(2, &ram, &swp);

        alloc(&a, PAGE_SIZE, 0).unwrap();
        alloc(&b, PAGE_SIZE, 0).unwrap();
        write(&a, 0, 0, 10).unwrap();
        write(&b, 0, 0, 20).unwrap();
        assert_eq!(lock(&ram).free_count(), 0);

        // Same virtual address, different frames
        assert_eq!(read(&a, 0, 0), Ok(10));
        assert_eq!(read(&b, 0, 0), Ok(20));

        // A third page for `a` must evict a's own page, never b's
        alloc(&a, PAGE_SIZE, 1).unwrap();
        write(&a, 1, 0, 30).unwrap();
        assert_eq!(read(&b, 0, 0), Ok(20));
        assert_eq!(read(&a, 0, 0), Ok(10));
        assert_eq!(read(&a, 1, 0), Ok(30));
    }

    #[test]
    fn test_release_memory() {
        let ram = MemPhy::shared(2);
        let swp = MemPhy::shared(4);
        let proc = pcb_with(1, &ram, &swp);

        alloc(&proc, 3 * PAGE_SIZE, 0).unwrap();
        for page in 0..3 {
            write(&proc, 0, page * PAGE_SIZE, 1).unwrap();
        }
        assert_eq!(release_memory(&proc), (2, 1));
        assert_eq!(lock(&ram).free_count(), 2);
        assert_eq!(lock(&swp).free_count(), 4);
        assert_eq!(release_memory(&proc), (0, 0));
    }

    #[test]
    fn test_concurrent_processes() {
        // Seven frames for eight pages: at least one frame is always free for a
        // process that holds none, and someone has to evict
        let ram = MemPhy::shared(7);
        let swp = MemPhy::shared(32);
        let procs: Vec<Arc<Pcb>> = (0..4).map(|pid| Arc::new(pcb_with(pid, &ram, &swp))).collect();

        std::thread::scope(|scope| {
            for proc in &procs {
                scope.spawn(move || {
                    let tag = proc.pid() as u8;
                    alloc(proc, 2 * PAGE_SIZE, 0).unwrap();
                    for round in 0..20u8 {
                        let off = (round as usize * 31) % (2 * PAGE_SIZE);
                        write(proc, 0, off, tag.wrapping_add(round)).unwrap();
                        assert_eq!(read(proc, 0, off), Ok(tag.wrapping_add(round)));
                    }
                });
            }
        });

        for proc in &procs {
            release_memory(proc);
        }
        assert_eq!(lock(&ram).free_count(), 7);
        assert_eq!(lock(&swp).free_count(), 32);
    }
}
