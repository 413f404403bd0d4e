//! Per-process address space and region allocator
//!
//! An address space owns an ordered set of VMAs. Each VMA has a growth cursor
//! (`sbrk`) and a list of free regions; allocated regions are bound to small
//! integer handles in the symbol table. VMAs only ever grow, one page-aligned
//! step at a time, and never into another VMA.

use std::collections::VecDeque;
use std::fmt::Write as _;

use log::debug;

use crate::config::Config;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::pte::PageTableEntry;

/// Half-open virtual byte range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmRegion {
    pub start: usize,
    pub end: usize,
}

impl VmRegion {
    pub fn new(start: usize, end: usize) -> Self {
        VmRegion { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Does `[start, end)` intersect this range? An empty range counts as the
    /// single point `start`.
    #[inline]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        if self.is_empty() {
            start <= self.start && self.start < end
        } else {
            self.start < end && start < self.end
        }
    }
}

/// Symbol-table entry: an allocated region and the VMA it was carved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub vmaid: usize,
    pub region: VmRegion,
}

#[derive(Debug)]
pub struct VmArea {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    /// Current growth point; equal to `end` once a growth step commits.
    pub sbrk: usize,
    free_list: VecDeque<VmRegion>,
}

impl VmArea {
    fn new(id: usize, start: usize) -> Self {
        VmArea { id, start, end: start, sbrk: start, free_list: VecDeque::new() }
    }

    pub fn range(&self) -> VmRegion {
        VmRegion::new(self.start, self.end)
    }

    /// Free regions, head of the list first
    pub fn free_regions(&self) -> impl Iterator<Item = &VmRegion> {
        self.free_list.iter()
    }

    /// Prepend a region to the free list. Adjacent regions are not coalesced.
    fn enlist_free(&mut self, region: VmRegion) -> bool {
        if region.is_empty() {
            return false;
        }
        self.free_list.push_front(region);
        true
    }

    /// First fit: carve `size` bytes off the front of the first large enough node.
    fn take_free_region(&mut self, size: usize) -> Option<VmRegion> {
        let idx = self.free_list.iter().position(|rg| rg.len() >= size)?;
        let node = &mut self.free_list[idx];
        let taken = VmRegion::new(node.start, node.start + size);
        node.start += size;
        if node.is_empty() {
            self.free_list.remove(idx);
        }
        Some(taken)
    }
}

pub struct MmStruct {
    /// Sorted by id
    vmas: Vec<VmArea>,
    symtbl: Vec<Option<SymbolEntry>>,
    pgd: Vec<PageTableEntry>,
    /// Resident pages in load order, oldest first
    fifo: VecDeque<usize>,
}

impl MmStruct {
    /// Fresh address space with VMA 0 at address 0 and VMA 1 at the heap base
    pub fn new(config: &Config) -> Self {
        let mut mm = Self::empty(config.symtbl_size);
        mm.vmas.push(VmArea::new(0, 0));
        mm.vmas.push(VmArea::new(1, config.heap_base));
        mm
    }

    /// Address space without any VMA
    pub fn empty(symtbl_size: usize) -> Self {
        MmStruct {
            vmas: Vec::new(),
            symtbl: vec![None; symtbl_size],
            pgd: vec![PageTableEntry::UNBACKED; MAX_PGN],
            fifo: VecDeque::new(),
        }
    }

    /// Create an empty VMA at `start`, returning its id
    pub fn add_vma(&mut self, start: usize) -> Result<usize> {
        if start % PAGE_SIZE != 0 || start >= MAX_VA {
            return Err(Error::InvalidAddress(start));
        }
        let id = self.vmas.last().map_or(0, |vma| vma.id + 1);
        if let Some(other) = self.vmas.iter().find(|vma| vma.range().overlaps(start, start + 1)) {
            return Err(Error::OverlapDetected { vmaid: other.id, start, end: start });
        }
        self.vmas.push(VmArea::new(id, start));
        Ok(id)
    }

    pub fn vmas(&self) -> &[VmArea] {
        &self.vmas
    }

    pub fn vma(&self, vmaid: usize) -> Result<&VmArea> {
        self.vmas.iter().find(|vma| vma.id == vmaid).ok_or(Error::InvalidVma(vmaid))
    }

    fn vma_mut(&mut self, vmaid: usize) -> Result<&mut VmArea> {
        self.vmas.iter_mut().find(|vma| vma.id == vmaid).ok_or(Error::InvalidVma(vmaid))
    }

    /// Region bound to `handle`
    pub fn symbol(&self, handle: usize) -> Result<SymbolEntry> {
        self.symtbl.get(handle).copied().flatten().ok_or(Error::InvalidHandle(handle))
    }

    /// Every bound handle with its entry
    pub fn symbols(&self) -> impl Iterator<Item = (usize, &SymbolEntry)> {
        self.symtbl.iter().enumerate().filter_map(|(h, e)| e.as_ref().map(|e| (h, e)))
    }

    /// Take a free region of `size` bytes from the VMA, if one fits.
    pub fn get_free_vmrg_area(&mut self, vmaid: usize, size: usize) -> Result<Option<VmRegion>> {
        Ok(self.vma_mut(vmaid)?.take_free_region(size))
    }

    /// Check `[start, end)` against every VMA other than `vmaid`.
    pub fn validate_overlap_vm_area(&self, vmaid: usize, start: usize, end: usize) -> Result<()> {
        match self.vmas.iter().find(|vma| vma.id != vmaid && vma.range().overlaps(start, end)) {
            Some(_) => Err(Error::OverlapDetected { vmaid, start, end }),
            None => Ok(()),
        }
    }

    /// Grow the VMA by `inc_sz` bytes rounded up to whole pages.
    ///
    /// The new range starts at the break and is pushed onto the free list; its
    /// pages stay unbacked until first touched. Nothing changes on failure.
    pub fn inc_vma_limit(&mut self, vmaid: usize, inc_sz: usize) -> Result<()> {
        let inc_amt = page_align_up(inc_sz);
        let sbrk = self.vma(vmaid)?.sbrk;
        let end = match sbrk.checked_add(inc_amt) {
            Some(end) if end <= MAX_VA => end,
            _ => return Err(Error::RegionExhausted { vmaid, size: inc_sz }),
        };
        let area = VmRegion::new(sbrk, end);
        self.validate_overlap_vm_area(vmaid, area.start, area.end)?;

        for pgn in area.start / PAGE_SIZE..area.end / PAGE_SIZE {
            self.pgd[pgn] = PageTableEntry::UNBACKED;
        }
        let vma = self.vma_mut(vmaid)?;
        vma.end = area.end;
        vma.sbrk = area.end;
        vma.enlist_free(area);
        debug!("vma {} grown to [{:#x}, {:#x})", vmaid, vma.start, vma.end);
        Ok(())
    }

    /// Allocate `size` bytes in the VMA and bind them to `handle`.
    ///
    /// Tries the free list first; on a miss grows the VMA once and retries.
    pub fn alloc(&mut self, vmaid: usize, handle: usize, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(Error::InvalidSize(size));
        }
        match self.symtbl.get(handle) {
            Some(None) => {}
            _ => return Err(Error::InvalidHandle(handle)),
        }

        let region = match self.get_free_vmrg_area(vmaid, size)? {
            Some(region) => region,
            None => {
                self.inc_vma_limit(vmaid, size)?;
                self.get_free_vmrg_area(vmaid, size)?
                    .ok_or(Error::RegionExhausted { vmaid, size })?
            }
        };
        self.symtbl[handle] = Some(SymbolEntry { vmaid, region });
        Ok(region.start)
    }

    /// Unbind `handle` and give its region back to the owning VMA.
    pub fn free(&mut self, handle: usize) -> Result<VmRegion> {
        let entry = self.symbol(handle)?;
        self.vma_mut(entry.vmaid)?.enlist_free(entry.region);
        self.symtbl[handle] = None;
        Ok(entry.region)
    }

    pub fn pte(&self, pgn: usize) -> Result<PageTableEntry> {
        self.pgd.get(pgn).copied().ok_or(Error::InvalidAddress(pgn * PAGE_SIZE))
    }

    pub(crate) fn set_pte(&mut self, pgn: usize, pte: PageTableEntry) {
        self.pgd[pgn] = pte;
    }

    pub(crate) fn page_table(&self) -> &[PageTableEntry] {
        &self.pgd
    }

    pub fn fifo(&self) -> &VecDeque<usize> {
        &self.fifo
    }

    pub(crate) fn fifo_mut(&mut self) -> &mut VecDeque<usize> {
        &mut self.fifo
    }

    pub fn resident_pages(&self) -> usize {
        self.pgd.iter().filter(|pte| pte.is_present()).count()
    }

    /// Page-table listing for the pages covered by the VMAs
    pub fn dump_page_table(&self) -> String {
        let mut out = String::new();
        for vma in &self.vmas {
            let first = vma.start / PAGE_SIZE;
            let last = vma.end / PAGE_SIZE;
            let _ = writeln!(out, "print_pgtbl: vma {} [{:#x}, {:#x})", vma.id, vma.start, vma.end);
            for pgn in first..last {
                let pte = self.pgd[pgn];
                let state = match (pte.frame(), pte.swap_slot()) {
                    (Some(fpn), _) => format!("frame {}", fpn),
                    (None, Some(slot)) => format!("swap {}", slot),
                    (None, None) => "unbacked".to_string(),
                };
                let _ = writeln!(out, "{:08}: {:08x} ({})", pgn, pte.raw(), state);
            }
        }
        out
    }
}
