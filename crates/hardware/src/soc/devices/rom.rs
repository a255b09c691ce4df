//! Read-only memory regions.
//!
//! Used for the boot ROM (zero-filled) and the QSPI execute-in-place window (erased flash,
//! `0xFF`). Contents are fixed at construction; writes are dropped with a warning.

use tracing::warn;

use crate::soc::devices::Device;

/// A read-only region.
#[derive(Debug)]
pub struct Rom {
    name: String,
    base_addr: u64,
    data: Vec<u8>,
}

impl Rom {
    /// Creates a ROM of `size` bytes, every byte set to `fill`.
    pub fn new(name: impl Into<String>, base_addr: u64, size: usize, fill: u8) -> Self {
        Self {
            name: name.into(),
            base_addr,
            data: vec![fill; size],
        }
    }

    fn read_le<const N: usize>(&self, offset: u64) -> [u8; N] {
        let mut bytes = [0u8; N];
        let src = usize::try_from(offset)
            .ok()
            .and_then(|start| self.data.get(start..start.saturating_add(N)));
        if let Some(src) = src {
            bytes.copy_from_slice(src);
        }
        bytes
    }

    fn reject_write(&self, offset: u64, width: u32) {
        warn!(
            region = %self.name,
            addr = format_args!("{:#x}", self.base_addr + offset),
            width,
            "ignored write to read-only memory"
        );
    }
}

impl Device for Rom {
    fn name(&self) -> &str {
        &self.name
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.data.len() as u64)
    }

    fn read_u8(&mut self, offset: u64) -> u8 {
        self.read_le::<1>(offset)[0]
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        u16::from_le_bytes(self.read_le(offset))
    }

    fn read_u32(&mut self, offset: u64) -> u32 {
        u32::from_le_bytes(self.read_le(offset))
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from_le_bytes(self.read_le(offset))
    }

    fn write_u8(&mut self, offset: u64, _val: u8) {
        self.reject_write(offset, 1);
    }

    fn write_u16(&mut self, offset: u64, _val: u16) {
        self.reject_write(offset, 2);
    }

    fn write_u32(&mut self, offset: u64, _val: u32) {
        self.reject_write(offset, 4);
    }

    fn write_u64(&mut self, offset: u64, _val: u64) {
        self.reject_write(offset, 8);
    }

    fn write_bytes(&mut self, offset: u64, data: &[u8]) {
        self.reject_write(offset, data.len() as u32);
    }
}
