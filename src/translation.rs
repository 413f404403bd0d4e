use crate::constants::*;
use crate::error::{Error, Result};
use crate::memphy::MemPhy;
use crate::swap;
use crate::vm::MmStruct;

/// Represents the decomposed components of a Virtual Address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: usize,
    pub pgn: usize,
    pub off: usize,
}

impl VirtualAddress {
    /// Decompose a raw VA into page number and in-page offset
    pub fn from_raw(va: usize) -> Result<Self> {
        if va >= MAX_VA {
            return Err(Error::InvalidAddress(va));
        }
        Ok(VirtualAddress {
            va,
            pgn: (va >> OFFSET_BITS) & PGN_MASK,
            off: va & OFFSET_MASK,
        })
    }

    /// Physical address of this VA once its page sits in frame `fpn`
    #[inline]
    pub fn physical(&self, fpn: usize) -> usize {
        (fpn << OFFSET_BITS) | self.off
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({:#x}) = (pgn={}, off={})", self.va, self.pgn, self.off)
    }
}

/// Frame holding page `pgn`, faulting it in when it is not resident.
pub fn pg_getpage(mm: &mut MmStruct, pgn: usize, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<usize> {
    match mm.pte(pgn)?.frame() {
        Some(fpn) => Ok(fpn),
        None => swap::service_page_fault(mm, pgn, ram, swp),
    }
}

/// Translate a virtual address to a physical RAM address
pub fn translate(mm: &mut MmStruct, va: usize, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<usize> {
    let va = VirtualAddress::from_raw(va)?;
    let fpn = pg_getpage(mm, va.pgn, ram, swp)?;
    Ok(va.physical(fpn))
}

/// Read the byte at a virtual address
pub fn pg_getval(mm: &mut MmStruct, va: usize, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<u8> {
    let pa = translate(mm, va, ram, swp)?;
    ram.read(pa)
}

/// Write the byte at a virtual address
pub fn pg_setval(mm: &mut MmStruct, va: usize, value: u8, ram: &mut MemPhy, swp: &mut MemPhy) -> Result<()> {
    let pa = translate(mm, va, ram, swp)?;
    ram.write(pa, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pte::PageTableEntry;

    #[test]
    fn test_va_decomposition() {
        // pgn = 3, off = 10
        let va = VirtualAddress::from_raw(3 * 256 + 10).unwrap();
        assert_eq!(va.pgn, 3);
        assert_eq!(va.off, 10);

        let va = VirtualAddress::from_raw(0).unwrap();
        assert_eq!((va.pgn, va.off), (0, 0));

        let va = VirtualAddress::from_raw(MAX_VA - 1).unwrap();
        assert_eq!((va.pgn, va.off), (MAX_PGN - 1, PAGE_SIZE - 1));
    }

    #[test]
    fn test_va_out_of_range() {
        assert_eq!(VirtualAddress::from_raw(MAX_VA), Err(Error::InvalidAddress(MAX_VA)));
    }

    #[test]
    fn test_va_reconstruction() {
        for &addr in &[0, 255, 256, 789, 40_000, MAX_VA - 1] {
            let va = VirtualAddress::from_raw(addr).unwrap();
            assert_eq!((va.pgn << OFFSET_BITS) | va.off, addr, "Failed for VA={}", addr);
        }
    }

    #[test]
    fn test_physical_address() {
        let va = VirtualAddress::from_raw(5 * 256 + 17).unwrap();
        assert_eq!(va.physical(9), 9 * 256 + 17);
    }

    #[test]
    fn test_display() {
        let va = VirtualAddress::from_raw(0x30a).unwrap();
        let display = format!("{}", va);
        assert!(display.contains("0x30a"));
        assert!(display.contains("pgn=3"));
        assert!(display.contains("off=10"));
    }

    #[test]
    fn test_present_page_translates_directly() {
        let mut mm = MmStruct::new(&Config::default());
        let mut ram = MemPhy::new(4);
        let mut swp = MemPhy::new(4);
        mm.alloc(0, 0, 2 * PAGE_SIZE).unwrap();
        mm.set_pte(1, PageTableEntry::resident(3));

        assert_eq!(translate(&mut mm, 256 + 7, &mut ram, &mut swp), Ok(3 * 256 + 7));
        // No fault was taken, so nothing joined the FIFO list
        assert!(mm.fifo().is_empty());
        assert_eq!(ram.free_count(), 4);
    }

    #[test]
    fn test_fault_installs_present_entry() {
        let mut mm = MmStruct::new(&Config::default());
        let mut ram = MemPhy::new(4);
        let mut swp = MemPhy::new(4);
        mm.alloc(0, 0, PAGE_SIZE).unwrap();

        let pa = translate(&mut mm, 20, &mut ram, &mut swp).unwrap();
        assert_eq!(pa, 20);
        assert_eq!(mm.pte(0).unwrap().frame(), Some(0));
        assert_eq!(mm.fifo().iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_get_set_val() {
        let mut mm = MmStruct::new(&Config::default());
        let mut ram = MemPhy::new(2);
        let mut swp = MemPhy::new(2);
        mm.alloc(0, 0, 300).unwrap();

        pg_setval(&mut mm, 299, 77, &mut ram, &mut swp).unwrap();
        assert_eq!(pg_getval(&mut mm, 299, &mut ram, &mut swp), Ok(77));
        assert_eq!(pg_getval(&mut mm, 298, &mut ram, &mut swp), Ok(0));
    }
}
