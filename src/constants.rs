// Virtual address layout: | page number (14 bits) | offset (8 bits) |
pub const OFFSET_BITS: u32 = 8;
pub const ADDR_BITS: u32 = 22;
pub const PGN_BITS: u32 = ADDR_BITS - OFFSET_BITS;

pub const PAGE_SIZE: usize = 1 << OFFSET_BITS;
pub const MAX_PGN: usize = 1 << PGN_BITS;
pub const MAX_VA: usize = 1 << ADDR_BITS;

pub const OFFSET_MASK: usize = PAGE_SIZE - 1;
pub const PGN_MASK: usize = MAX_PGN - 1;

// PTE: the frame number and the swap slot share the low field bits.
pub const PTE_FIELD_BITS: u32 = 26;
pub const PTE_FIELD_MASK: u32 = (1 << PTE_FIELD_BITS) - 1;

pub const DEFAULT_RAM_FRAMES: usize = 16;
pub const DEFAULT_SWAP_SLOTS: usize = 64;
pub const DEFAULT_MAX_PRIO: usize = 140;
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;
pub const DEFAULT_SYMTBL_SIZE: usize = 30;
pub const DEFAULT_HEAP_BASE: usize = MAX_VA / 2;
pub const DEFAULT_CPUS: usize = 2;
pub const DEFAULT_TIME_SLICE: usize = 2;

/// Round `size` up to a whole number of pages. Saturates at the largest
/// page-aligned `usize`.
#[inline]
pub const fn page_align_up(size: usize) -> usize {
    size.saturating_add(PAGE_SIZE - 1) & !OFFSET_MASK
}
