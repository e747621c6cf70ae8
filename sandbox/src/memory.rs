//! Bounds-checked access to guest linear memory and the packed-result
//! convention.
//!
//! Every pointer and length is validated against the current memory size
//! before any byte is touched. Nothing here calls into the guest; the
//! allocation protocol lives in [`crate::bridge`].

use std::fmt;
use std::ops::Range;

/// An access that falls outside guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub ptr: u32,
    pub len: usize,
    pub memory_size: usize,
}

/// A `(pointer, length)` region of guest memory.
///
/// Exported functions that return a variable-length buffer pack it into one
/// 64-bit value: bits 63..32 hold the pointer, bits 31..0 the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestRegion {
    pub ptr: u32,
    pub len: u32,
}

impl GuestRegion {
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    /// Split a packed result into pointer and length.
    pub fn from_packed(packed: u64) -> Self {
        Self {
            ptr: (packed >> 32) as u32,
            len: (packed & 0xffff_ffff) as u32,
        }
    }

    pub fn packed(self) -> u64 {
        (u64::from(self.ptr) << 32) | u64::from(self.len)
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for GuestRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{}", self.ptr, self.len)
    }
}

/// Byte range `[ptr, ptr + len)` if it lies inside a memory of `memory_size` bytes.
pub fn checked_range(memory_size: usize, ptr: u32, len: usize) -> Result<Range<usize>, OutOfBounds> {
    let start = ptr as usize;
    let fault = OutOfBounds { ptr, len, memory_size };
    let end = start.checked_add(len).ok_or(fault)?;
    if end > memory_size {
        return Err(fault);
    }
    Ok(start..end)
}

/// Copy `len` bytes out of guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: u32) -> Result<Vec<u8>, OutOfBounds> {
    let range = checked_range(mem.len(), ptr, len as usize)?;
    Ok(mem[range].to_vec())
}

/// Copy `data` into guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), OutOfBounds> {
    let range = checked_range(mem.len(), ptr, data.len())?;
    mem[range].copy_from_slice(data);
    Ok(())
}
