//! Device trait for memory-mapped I/O.
//!
//! This module defines the `Device` trait implemented by all bus-attached components. It provides:
//! 1. **Identification:** `name` and `address_range` for bus routing.
//! 2. **Access:** Byte, half, word, and doubleword read/write at device-relative offsets.
//! 3. **Lifecycle:** Optional `tick` for timers and interrupt sources.
//! 4. **Downcasting:** Optional casts to `Plic` or `Uart` for device-specific access.
//!
//! All implementors must be `Send + Sync` so the composed machine can be handed to an
//! execution core on another thread.

use crate::soc::devices::{Plic, Uart};

/// Chunk size used by the default `fill_zero`.
const ZERO_CHUNK: usize = 4096;

/// Trait for memory-mapped I/O devices attached to the system bus.
///
/// Devices provide a name, address range, and read/write methods. Interrupt outputs are
/// `IrqLine`s handed to the device at construction and driven from `tick` or from register
/// writes; the bus never inspects them.
pub trait Device: Send + Sync {
    /// Returns the region name (e.g., `"uart0"`, `"dtim"`).
    fn name(&self) -> &str;
    /// Returns (base_address, size_in_bytes) for this device's MMIO or memory region.
    fn address_range(&self) -> (u64, u64);
    /// Reads one byte at the given device-relative offset.
    fn read_u8(&mut self, offset: u64) -> u8;
    /// Reads two bytes (little-endian) at the given offset.
    fn read_u16(&mut self, offset: u64) -> u16;
    /// Reads four bytes (little-endian) at the given offset.
    fn read_u32(&mut self, offset: u64) -> u32;
    /// Reads eight bytes (little-endian) at the given offset.
    fn read_u64(&mut self, offset: u64) -> u64;
    /// Writes one byte at the given offset.
    fn write_u8(&mut self, offset: u64, val: u8);
    /// Writes two bytes (little-endian) at the given offset.
    fn write_u16(&mut self, offset: u64, val: u16);
    /// Writes four bytes (little-endian) at the given offset.
    fn write_u32(&mut self, offset: u64, val: u32);
    /// Writes eight bytes (little-endian) at the given offset.
    fn write_u64(&mut self, offset: u64, val: u64);

    /// Writes a contiguous byte slice at the given offset (default: byte-by-byte).
    fn write_bytes(&mut self, offset: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_u8(offset + i as u64, *byte);
        }
    }

    /// Zeroes `len` bytes starting at `offset` (default: chunked `write_bytes`).
    fn fill_zero(&mut self, offset: u64, len: u64) {
        let zeros = [0u8; ZERO_CHUNK];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(ZERO_CHUNK as u64);
            self.write_bytes(offset + done, &zeros[..n as usize]);
            done += n;
        }
    }

    /// Advances device state by one tick and updates its interrupt outputs.
    fn tick(&mut self) {}

    /// Returns a mutable reference as `Plic` if this device is the PLIC; otherwise `None`.
    fn as_plic_mut(&mut self) -> Option<&mut Plic> {
        None
    }
    /// Returns a mutable reference as `Uart` if this device is a UART; otherwise `None`.
    fn as_uart_mut(&mut self) -> Option<&mut Uart> {
        None
    }
}
