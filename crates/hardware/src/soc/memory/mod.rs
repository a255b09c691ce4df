//! Physical RAM regions.
//!
//! This module implements the read/write memory devices of the machine. It provides:
//! 1. **Buffer:** Lazily allocated backing storage (`DramBuffer`).
//! 2. **Memory:** Device implementation that maps a buffer at a physical base address.
//!
//! Both the LBWIF RAM window and the main DTIM RAM are `Memory` regions.

/// RAM buffer implementation (mmap or `Vec`) for raw byte storage.
pub mod buffer;

use tracing::warn;

use self::buffer::DramBuffer;
use crate::common::RealizeError;
use crate::soc::devices::Device;

/// A RAM region.
pub struct Memory {
    /// Region name.
    name: String,
    /// Backing storage.
    buffer: DramBuffer,
    /// The base physical address where this memory is mapped.
    base_addr: u64,
}

impl Memory {
    /// Creates a region from an existing buffer.
    ///
    /// # Arguments
    ///
    /// * `name` - Region name in the address space.
    /// * `buffer` - Backing storage; its length is the region size.
    /// * `base_addr` - Starting physical address.
    pub fn new(name: impl Into<String>, buffer: DramBuffer, base_addr: u64) -> Self {
        Self {
            name: name.into(),
            buffer,
            base_addr,
        }
    }

    /// Allocates a zero-filled region of `size` bytes.
    ///
    /// # Errors
    ///
    /// `RealizeError::Allocation` if `size` does not fit the host or cannot be mapped.
    pub fn allocate(
        name: impl Into<String>,
        base_addr: u64,
        size: u64,
    ) -> Result<Self, RealizeError> {
        let name = name.into();
        let buffer = usize::try_from(size)
            .ok()
            .and_then(|len| DramBuffer::new(len).ok())
            .ok_or_else(|| RealizeError::Allocation {
                name: name.clone(),
                size,
            })?;
        Ok(Self::new(name, buffer, base_addr))
    }

    /// Loads a byte slice into memory at a specific offset.
    ///
    /// # Arguments
    ///
    /// * `data` - The data to write.
    /// * `offset` - The byte offset relative to the memory base address.
    ///
    /// # Returns
    ///
    /// `false` (with nothing written) if the slice does not fit.
    pub fn load(&mut self, data: &[u8], offset: usize) -> bool {
        self.buffer.write_slice(offset, data)
    }

    /// Returns `len` bytes at `offset`, or `None` if out of range.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.buffer.read_slice(offset, len)
    }

    fn read_le<const N: usize>(&self, offset: u64) -> [u8; N] {
        usize::try_from(offset)
            .ok()
            .and_then(|i| self.buffer.read_slice(i, N))
            .and_then(|s| s.try_into().ok())
            .unwrap_or([0; N])
    }

    fn write_le(&mut self, offset: u64, bytes: &[u8]) {
        let written = usize::try_from(offset)
            .ok()
            .is_some_and(|i| self.buffer.write_slice(i, bytes));
        if !written {
            warn!(
                region = %self.name,
                offset = format_args!("{offset:#x}"),
                len = bytes.len(),
                "dropped out-of-range RAM write"
            );
        }
    }
}

impl Device for Memory {
    /// Returns the device name.
    fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address range (Base, Size).
    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.buffer.len() as u64)
    }

    /// Reads a byte from memory.
    fn read_u8(&mut self, offset: u64) -> u8 {
        self.read_le::<1>(offset)[0]
    }

    /// Reads a half-word (16-bit) from memory (Little Endian).
    fn read_u16(&mut self, offset: u64) -> u16 {
        u16::from_le_bytes(self.read_le(offset))
    }

    /// Reads a word (32-bit) from memory (Little Endian).
    fn read_u32(&mut self, offset: u64) -> u32 {
        u32::from_le_bytes(self.read_le(offset))
    }

    /// Reads a double-word (64-bit) from memory (Little Endian).
    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from_le_bytes(self.read_le(offset))
    }

    /// Writes a byte to memory.
    fn write_u8(&mut self, offset: u64, val: u8) {
        self.write_le(offset, &[val]);
    }

    /// Writes a half-word to memory (Little Endian).
    fn write_u16(&mut self, offset: u64, val: u16) {
        self.write_le(offset, &val.to_le_bytes());
    }

    /// Writes a word to memory (Little Endian).
    fn write_u32(&mut self, offset: u64, val: u32) {
        self.write_le(offset, &val.to_le_bytes());
    }

    /// Writes a double-word to memory (Little Endian).
    fn write_u64(&mut self, offset: u64, val: u64) {
        self.write_le(offset, &val.to_le_bytes());
    }

    /// Writes a slice of bytes to memory.
    fn write_bytes(&mut self, offset: u64, data: &[u8]) {
        self.write_le(offset, data);
    }

    /// Zeroes a range; whole pages are released back to the host instead of written.
    fn fill_zero(&mut self, offset: u64, len: u64) {
        let cleared = usize::try_from(offset)
            .ok()
            .zip(usize::try_from(len).ok())
            .is_some_and(|(offset, len)| self.buffer.zero_range(offset, len));
        if !cleared {
            warn!(
                region = %self.name,
                offset = format_args!("{offset:#x}"),
                len,
                "dropped out-of-range RAM fill"
            );
        }
    }
}
