//! Page-table entry layout
//!
//! ```text
//!  31       30       29..26    25 ........................ 0
//! PRESENT  SWAPPED  (unused)  frame number  |  swap slot
//! ```
//!
//! The low field holds the frame number when PRESENT is set and the swap slot
//! when SWAPPED is set. An entry with neither bit is "unbacked": the page lies
//! inside a VMA but has never been touched.

use bitflags::bitflags;

use crate::constants::PTE_FIELD_MASK;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT = 1 << 31;
        const SWAPPED = 1 << 30;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    pub const UNBACKED: PageTableEntry = PageTableEntry(0);

    pub fn resident(fpn: usize) -> Self {
        debug_assert!(fpn as u32 <= PTE_FIELD_MASK);
        PageTableEntry(PteFlags::PRESENT.bits() | (fpn as u32 & PTE_FIELD_MASK))
    }

    pub fn swapped(slot: usize) -> Self {
        debug_assert!(slot as u32 <= PTE_FIELD_MASK);
        PageTableEntry(PteFlags::SWAPPED.bits() | (slot as u32 & PTE_FIELD_MASK))
    }

    #[inline]
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn is_present(self) -> bool {
        self.flags().contains(PteFlags::PRESENT)
    }

    #[inline]
    pub fn is_swapped(self) -> bool {
        !self.is_present() && self.flags().contains(PteFlags::SWAPPED)
    }

    /// Frame number, meaningful only for a present page
    pub fn frame(self) -> Option<usize> {
        self.is_present().then_some((self.0 & PTE_FIELD_MASK) as usize)
    }

    /// Swap slot, meaningful only for a swapped-out page
    pub fn swap_slot(self) -> Option<usize> {
        self.is_swapped().then_some((self.0 & PTE_FIELD_MASK) as usize)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbacked() {
        let pte = PageTableEntry::UNBACKED;
        assert!(!pte.is_present());
        assert!(!pte.is_swapped());
        assert_eq!(pte.frame(), None);
        assert_eq!(pte.swap_slot(), None);
    }

    #[test]
    fn test_resident_entry() {
        let pte = PageTableEntry::resident(13);
        assert!(pte.is_present());
        assert!(!pte.is_swapped());
        assert_eq!(pte.frame(), Some(13));
        assert_eq!(pte.swap_slot(), None);
        assert_eq!(pte.raw(), 0x8000_000d);
    }

    #[test]
    fn test_swapped_entry() {
        let pte = PageTableEntry::swapped(7);
        assert!(!pte.is_present());
        assert!(pte.is_swapped());
        assert_eq!(pte.swap_slot(), Some(7));
        assert_eq!(pte.frame(), None);
        assert_eq!(pte.raw(), 0x4000_0007);
    }

    #[test]
    fn test_field_limits() {
        let max = PTE_FIELD_MASK as usize;
        assert_eq!(PageTableEntry::resident(max).frame(), Some(max));
        assert_eq!(PageTableEntry::swapped(max).swap_slot(), Some(max));
    }
}
