//! FIFO page replacement
//!
//! Resident pages join the tail of the address space's FIFO list when they are
//! faulted in; the head is the eviction victim. An evicted page keeps its data
//! in a swap slot until it is faulted back, at which point the slot is freed.

use log::debug;

use crate::error::{Error, Result};
use crate::memphy::{swap_copy_page, MemPhy};
use crate::pte::PageTableEntry;
use crate::vm::MmStruct;

/// Oldest resident page, without removing it
pub fn find_victim_page(mm: &MmStruct) -> Option<usize> {
    mm.fifo().front().copied()
}

/// Get a RAM frame for a faulting page: a free one if any, else the frame of
/// the FIFO victim after its contents have been written to swap.
fn obtain_frame(mm: &mut MmStruct, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<usize> {
    if let Some(fpn) = ram.get_free_frame() {
        return Ok(fpn);
    }

    let Some(vicpgn) = find_victim_page(mm) else {
        // RAM is held by other address spaces
        return if mm.resident_pages() == 0 { Err(Error::OutOfFrames) } else { Err(Error::NoVictim) };
    };
    let vicfpn = mm.pte(vicpgn)?.frame().ok_or(Error::NoVictim)?;
    let swpfpn = swp.get_free_frame().ok_or(Error::OutOfSwap)?;

    if let Err(e) = swap_copy_page(ram, vicfpn, swp, swpfpn) {
        swp.put_free_frame(swpfpn);
        return Err(e);
    }
    mm.fifo_mut().pop_front();
    mm.set_pte(vicpgn, PageTableEntry::swapped(swpfpn));
    debug!("evicted page {} from frame {} to swap slot {}", vicpgn, vicfpn, swpfpn);
    Ok(vicfpn)
}

/// Make page `pgn` resident and return its frame.
pub fn service_page_fault(mm: &mut MmStruct, pgn: usize, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<usize> {
    let pte = mm.pte(pgn)?;
    if let Some(fpn) = pte.frame() {
        return Ok(fpn);
    }

    let fpn = obtain_frame(mm, ram, swp)?;
    match pte.swap_slot() {
        Some(slot) => {
            swap_copy_page(swp, slot, ram, fpn)?;
            swp.put_free_frame(slot);
            debug!("page {} swapped in from slot {} to frame {}", pgn, slot, fpn);
        }
        None => {
            ram.frame_mut(fpn).fill(0);
            debug!("page {} first touch, frame {}", pgn, fpn);
        }
    }
    mm.set_pte(pgn, PageTableEntry::resident(fpn));
    mm.fifo_mut().push_back(pgn);
    Ok(fpn)
}

/// Return every frame and swap slot owned by the address space.
///
/// Present pages give their frame back to RAM and swapped pages their slot
/// back to swap. All entries end unbacked and the FIFO list empty.
pub fn release_all(mm: &mut MmStruct, ram: &mut MemPhy, swp: &mut MemPhy) -> (usize, usize) {
    let mut frames = 0;
    let mut slots = 0;
    let owned: Vec<(usize, PageTableEntry)> = mm
        .page_table()
        .iter()
        .enumerate()
        .filter(|(_, pte)| pte.is_present() || pte.is_swapped())
        .map(|(pgn, &pte)| (pgn, pte))
        .collect();

    for (pgn, pte) in owned {
        if let Some(fpn) = pte.frame() {
            ram.put_free_frame(fpn);
            frames += 1;
        } else if let Some(slot) = pte.swap_slot() {
            swp.put_free_frame(slot);
            slots += 1;
        }
        mm.set_pte(pgn, PageTableEntry::UNBACKED);
    }
    mm.fifo_mut().clear();
    (frames, slots)
}
