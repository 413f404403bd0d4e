use std::fmt;

/// Failures reported by the memory manager and the scheduler.
///
/// Each variant maps to a single failed status at the syscall layer; none of
/// them abort the simulated machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Symbol-table handle is out of range, unbound, or already bound.
    InvalidHandle(usize),
    /// No VMA with this id exists in the address space.
    InvalidVma(usize),
    /// Zero-byte allocation request.
    InvalidSize(usize),
    /// No free region was found, even after growing the VMA.
    RegionExhausted { vmaid: usize, size: usize },
    /// Growing a VMA would collide with another VMA.
    OverlapDetected { vmaid: usize, start: usize, end: usize },
    /// Byte offset is outside the region bound to the handle.
    OffsetOutOfRange { handle: usize, offset: usize, len: usize },
    /// Address is outside the device or the virtual address space.
    InvalidAddress(usize),
    /// RAM has no free frame and the address space has nothing to evict.
    OutOfFrames,
    /// The active swap device has no free slot.
    OutOfSwap,
    /// FIFO bookkeeping disagrees with the page table.
    NoVictim,
    /// Scheduler queue is at capacity.
    QueueFull,
    /// Process priority is outside the configured levels.
    InvalidPriority(usize),
}

impl Error {
    /// True for bookkeeping violations, as opposed to legitimate exhaustion.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::NoVictim)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(h) => write!(f, "invalid region handle {}", h),
            Error::InvalidVma(id) => write!(f, "invalid vm area {}", id),
            Error::InvalidSize(sz) => write!(f, "invalid allocation size {}", sz),
            Error::RegionExhausted { vmaid, size } => {
                write!(f, "no free region of {} bytes in vm area {}", size, vmaid)
            }
            Error::OverlapDetected { vmaid, start, end } => write!(
                f,
                "growing vm area {} to [{:#x}, {:#x}) overlaps another area",
                vmaid, start, end
            ),
            Error::OffsetOutOfRange { handle, offset, len } => write!(
                f,
                "offset {} is outside region {} of length {}",
                offset, handle, len
            ),
            Error::InvalidAddress(addr) => write!(f, "invalid address {:#x}", addr),
            Error::OutOfFrames => write!(f, "out of physical frames"),
            Error::OutOfSwap => write!(f, "out of swap space"),
            Error::NoVictim => write!(f, "no victim page in FIFO list"),
            Error::QueueFull => write!(f, "queue is full"),
            Error::InvalidPriority(p) => write!(f, "invalid priority {}", p),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors() {
        assert!(Error::NoVictim.is_internal());
        assert!(!Error::OutOfFrames.is_internal());
        assert!(!Error::OutOfSwap.is_internal());
        assert!(!Error::QueueFull.is_internal());
    }

    #[test]
    fn test_display() {
        let msg = Error::RegionExhausted { vmaid: 0, size: 300 }.to_string();
        assert!(msg.contains("300"));
        assert!(Error::InvalidAddress(0x100).to_string().contains("0x100"));
    }
}
