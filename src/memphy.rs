use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::constants::*;
use crate::error::{Error, Result};

/// Simulated physical memory device: RAM or a swap device.
///
/// Storage is a flat byte array split into `PAGE_SIZE` frames. The device keeps
/// its own free-frame list; it does not know which process owns a used frame.
pub struct MemPhy {
    storage: Vec<u8>,
    free_frames: VecDeque<usize>,
    frame_count: usize,
}

/// Device handle shared by every process of the machine
pub type SharedMemPhy = Arc<Mutex<MemPhy>>;

impl MemPhy {
    /// Create a zeroed device with `frames` frames, all of them free
    pub fn new(frames: usize) -> Self {
        MemPhy {
            storage: vec![0u8; frames * PAGE_SIZE],
            free_frames: (0..frames).collect(),
            frame_count: frames,
        }
    }

    pub fn shared(frames: usize) -> SharedMemPhy {
        Arc::new(Mutex::new(Self::new(frames)))
    }

    /// Read a byte from physical memory
    #[inline]
    pub fn read(&self, address: usize) -> Result<u8> {
        self.storage.get(address).copied().ok_or(Error::InvalidAddress(address))
    }

    /// Write a byte to physical memory
    #[inline]
    pub fn write(&mut self, address: usize, value: u8) -> Result<()> {
        let cell = self.storage.get_mut(address).ok_or(Error::InvalidAddress(address))?;
        *cell = value;
        Ok(())
    }

    /// Take a frame off the free list
    pub fn get_free_frame(&mut self) -> Option<usize> {
        self.free_frames.pop_front()
    }

    /// Return a frame to the free list; the most recently freed frame is reused first.
    pub fn put_free_frame(&mut self, fpn: usize) {
        debug_assert!(fpn < self.frame_count);
        debug_assert!(!self.free_frames.contains(&fpn), "frame {} freed twice", fpn);
        self.free_frames.push_front(fpn);
    }

    pub fn free_count(&self) -> usize {
        self.free_frames.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(fpn: usize) -> usize {
        fpn * PAGE_SIZE
    }

    pub fn frame(&self, fpn: usize) -> &[u8] {
        let base = Self::frame_to_address(fpn);
        &self.storage[base..base + PAGE_SIZE]
    }

    pub fn frame_mut(&mut self, fpn: usize) -> &mut [u8] {
        let base = Self::frame_to_address(fpn);
        &mut self.storage[base..base + PAGE_SIZE]
    }

    /// Human readable listing of every non-zero byte
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "===== PHYSICAL MEMORY DUMP ({} frames, {} free) =====", self.frame_count, self.free_frames.len());
        for (addr, &byte) in self.storage.iter().enumerate() {
            if byte != 0 {
                let _ = writeln!(out, "BYTE {:08x}: {}", addr, byte);
            }
        }
        out.push_str("===== PHYSICAL MEMORY END-DUMP =====");
        out
    }
}

/// Copy one page between devices, e.g. from a RAM frame into a swap slot.
pub fn swap_copy_page(src: &MemPhy, src_fpn: usize, dst: &mut MemPhy, dst_fpn: usize) -> Result<()> {
    if src_fpn >= src.frame_count {
        return Err(Error::InvalidAddress(MemPhy::frame_to_address(src_fpn)));
    }
    if dst_fpn >= dst.frame_count {
        return Err(Error::InvalidAddress(MemPhy::frame_to_address(dst_fpn)));
    }
    dst.frame_mut(dst_fpn).copy_from_slice(src.frame(src_fpn));
    Ok(())
}

/// Lock a shared device, recovering the guard if another worker panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
