//! System interconnect (address space) for memory and MMIO access.
//!
//! This module implements the bus that routes physical address accesses to devices. It provides:
//! 1. **Region registration:** Devices are added by address range, checked for overlap, and
//!    kept sorted by base address.
//! 2. **Access routing:** Read/write by address with a last-device hint for throughput.
//! 3. **Tick:** Each device is ticked; the PLIC goes last so it samples source levels
//!    raised in the same tick.
//! 4. **Binary loading:** All-or-nothing placement of a byte blob inside one region.
//!
//! Regions are added during composition and never removed.

use std::fmt;

use tracing::debug;

use crate::common::{BusError, RealizeError};
use crate::soc::traits::Device;

/// Description of one mapped region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    /// Region name reported by the device.
    pub name: String,
    /// First byte of the region.
    pub base: u64,
    /// Length of the region in bytes.
    pub size: u64,
}

impl RegionInfo {
    /// Returns the exclusive end of the region.
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Returns whether `addr` lies inside the region.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// The composed address space; routes accesses by physical address.
///
/// Unmapped reads return 0 and unmapped writes are dropped, matching an open bus.
#[derive(Default)]
pub struct Bus {
    /// Registered MMIO and memory devices, sorted by base address.
    devices: Vec<Box<dyn Device>>,
    last_device_idx: usize,
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.regions()).finish()
    }
}

impl Bus {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a device at the range it reports.
    ///
    /// # Arguments
    ///
    /// * `dev` - The device to add.
    ///
    /// # Returns
    ///
    /// The mapped region.
    ///
    /// # Errors
    ///
    /// `RealizeError::RegionOverlap` if the range intersects an existing region, or is empty
    /// or wraps the address space.
    pub fn add_device(&mut self, dev: Box<dyn Device>) -> Result<RegionInfo, RealizeError> {
        let (base, size) = dev.address_range();
        let name = dev.name().to_string();

        let overlap_err = |other: &str| RealizeError::RegionOverlap {
            name: name.clone(),
            base,
            size,
            other: other.to_string(),
        };
        if size == 0 || base.checked_add(size).is_none() {
            return Err(overlap_err("<address space limit>"));
        }
        if let Some(existing) = self.devices.iter().find(|d| {
            let (b, s) = d.address_range();
            if b <= base { base - b < s } else { b - base < size }
        }) {
            return Err(overlap_err(existing.name()));
        }

        debug!(
            region = %name,
            base = format_args!("{base:#x}"),
            size = format_args!("{size:#x}"),
            "mapped region"
        );

        let at = self.devices.partition_point(|d| d.address_range().0 < base);
        self.devices.insert(at, dev);
        self.last_device_idx = 0;
        Ok(RegionInfo { name, base, size })
    }

    /// Returns every mapped region in ascending address order.
    pub fn regions(&self) -> Vec<RegionInfo> {
        self.devices
            .iter()
            .map(|d| {
                let (base, size) = d.address_range();
                RegionInfo {
                    name: d.name().to_string(),
                    base,
                    size,
                }
            })
            .collect()
    }

    /// Returns the region with the given name.
    pub fn region(&self, name: &str) -> Option<RegionInfo> {
        self.regions().into_iter().find(|r| r.name == name)
    }

    /// Returns the number of mapped regions.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns whether no region is mapped.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Writes a binary blob into the address space at the given physical address.
    ///
    /// The whole range must fall inside one region; otherwise nothing is written.
    ///
    /// # Arguments
    ///
    /// * `data` - Bytes to write.
    /// * `addr` - Physical base address.
    ///
    /// # Errors
    ///
    /// `BusError::Unmapped` if no single region covers `[addr, addr + data.len())`.
    pub fn load_binary_at(&mut self, data: &[u8], addr: u64) -> Result<(), BusError> {
        let len = data.len() as u64;
        let unmapped = BusError::Unmapped { addr, len };
        if data.is_empty() {
            return Ok(());
        }
        let (dev, offset) = self.find_device(addr).ok_or(unmapped.clone())?;
        let (_, size) = dev.address_range();
        if len > size - offset {
            return Err(unmapped);
        }
        dev.write_bytes(offset, data);
        Ok(())
    }

    /// Zeroes `[addr, addr + len)`.
    ///
    /// The whole range must fall inside one region; otherwise nothing is written.
    ///
    /// # Errors
    ///
    /// `BusError::Unmapped` if no single region covers the range.
    pub fn zero_fill(&mut self, addr: u64, len: u64) -> Result<(), BusError> {
        let unmapped = BusError::Unmapped { addr, len };
        if len == 0 {
            return Ok(());
        }
        let (dev, offset) = self.find_device(addr).ok_or(unmapped.clone())?;
        let (_, size) = dev.address_range();
        if len > size - offset {
            return Err(unmapped);
        }
        dev.fill_zero(offset, len);
        Ok(())
    }

    /// Returns whether the given physical address is backed by any region.
    pub fn is_valid_address(&self, paddr: u64) -> bool {
        self.devices.iter().any(|dev| {
            let (start, size) = dev.address_range();
            paddr >= start && paddr - start < size
        })
    }

    /// Advances every device by one tick, the PLIC last.
    pub fn tick(&mut self) {
        let mut plic_idx = None;
        for (i, dev) in self.devices.iter_mut().enumerate() {
            if dev.as_plic_mut().is_some() {
                plic_idx = Some(i);
                continue;
            }
            dev.tick();
        }
        if let Some(idx) = plic_idx {
            self.devices[idx].tick();
        }
    }

    /// Returns the UART mapped under `name`.
    pub fn uart_mut(&mut self, name: &str) -> Option<&mut crate::soc::devices::Uart> {
        self.devices
            .iter_mut()
            .filter(|dev| dev.name() == name)
            .find_map(|dev| dev.as_uart_mut())
    }

    fn find_device(&mut self, paddr: u64) -> Option<(&mut Box<dyn Device>, u64)> {
        if self.last_device_idx < self.devices.len() {
            let (start, size) = self.devices[self.last_device_idx].address_range();
            if paddr >= start && paddr - start < size {
                return Some((&mut self.devices[self.last_device_idx], paddr - start));
            }
        }

        let idx = self.devices.iter().position(|dev| {
            let (start, size) = dev.address_range();
            paddr >= start && paddr - start < size
        })?;
        self.last_device_idx = idx;
        let (start, _) = self.devices[idx].address_range();
        Some((&mut self.devices[idx], paddr - start))
    }

    /// Reads one byte at the given physical address; returns 0 if no device claims the address.
    pub fn read_u8(&mut self, paddr: u64) -> u8 {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.read_u8(offset)
        } else {
            0
        }
    }
    /// Reads two bytes (little-endian) at the given physical address; returns 0 if unclaimed.
    pub fn read_u16(&mut self, paddr: u64) -> u16 {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.read_u16(offset)
        } else {
            0
        }
    }
    /// Reads four bytes (little-endian) at the given physical address; returns 0 if unclaimed.
    pub fn read_u32(&mut self, paddr: u64) -> u32 {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.read_u32(offset)
        } else {
            0
        }
    }
    /// Reads eight bytes (little-endian) at the given physical address; returns 0 if unclaimed.
    pub fn read_u64(&mut self, paddr: u64) -> u64 {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.read_u64(offset)
        } else {
            0
        }
    }
    /// Writes one byte at the given physical address; no-op if no device claims it.
    pub fn write_u8(&mut self, paddr: u64, val: u8) {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.write_u8(offset, val);
        }
    }
    /// Writes two bytes (little-endian) at the given physical address; no-op if unclaimed.
    pub fn write_u16(&mut self, paddr: u64, val: u16) {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.write_u16(offset, val);
        }
    }
    /// Writes four bytes (little-endian) at the given physical address; no-op if unclaimed.
    pub fn write_u32(&mut self, paddr: u64, val: u32) {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.write_u32(offset, val);
        }
    }
    /// Writes eight bytes (little-endian) at the given physical address; no-op if unclaimed.
    pub fn write_u64(&mut self, paddr: u64, val: u64) {
        if let Some((dev, offset)) = self.find_device(paddr) {
            dev.write_u64(offset, val);
        }
    }
}
