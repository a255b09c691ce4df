//! Placeholder for register blocks with no behavioral model.
//!
//! Mapped so that accesses to documented addresses do not fall through to an open bus
//! silently: reads return zero, writes are dropped, and both are logged.

use tracing::warn;

use crate::soc::devices::Device;

/// An unmodeled register block.
#[derive(Debug)]
pub struct Unimplemented {
    name: String,
    base_addr: u64,
    size: u64,
}

impl Unimplemented {
    /// Creates the placeholder for `[base_addr, base_addr + size)`.
    pub fn new(name: impl Into<String>, base_addr: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            base_addr,
            size,
        }
    }

    fn log(&self, kind: &str, offset: u64, width: u32) {
        warn!(
            region = %self.name,
            addr = format_args!("{:#x}", self.base_addr + offset),
            width,
            "{kind} of unimplemented register block"
        );
    }
}

impl Device for Unimplemented {
    fn name(&self) -> &str {
        &self.name
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.size)
    }

    fn read_u8(&mut self, offset: u64) -> u8 {
        self.log("read", offset, 1);
        0
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        self.log("read", offset, 2);
        0
    }

    fn read_u32(&mut self, offset: u64) -> u32 {
        self.log("read", offset, 4);
        0
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        self.log("read", offset, 8);
        0
    }

    fn write_u8(&mut self, offset: u64, _val: u8) {
        self.log("write", offset, 1);
    }

    fn write_u16(&mut self, offset: u64, _val: u16) {
        self.log("write", offset, 2);
    }

    fn write_u32(&mut self, offset: u64, _val: u32) {
        self.log("write", offset, 4);
    }

    fn write_u64(&mut self, offset: u64, _val: u64) {
        self.log("write", offset, 8);
    }
}
