//! Memory map.
//!
//! The static table every other component consults for base addresses and sizes. It
//! provides:
//! 1. **Device identifiers:** One `DeviceId` per mapped block, in table order.
//! 2. **Entries:** `(device, base, size)` triples with range helpers.
//! 3. **Validation:** Overlapping, empty, wrapping, or misplaced entries are rejected
//!    before anything is built.
//!
//! Nothing outside this module hardcodes a device address.

use std::fmt;

use crate::common::ConfigError;

/// Identifier of a mapped device block; the discriminant is its slot in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceId {
    /// Debug module.
    Debug,
    /// System control block.
    SystemControl,
    /// Error device.
    Error,
    /// Boot ROM.
    BootRom,
    /// Tile reset control.
    TileResetControl,
    /// Core-local interruptor (ACLINT SWI + MTIMER).
    Clint,
    /// Platform-level interrupt controller.
    Plic,
    /// Serial-link RAM window.
    LbwifRam,
    /// QSPI flash controller registers.
    QspiControl,
    /// QSPI flash execute-in-place window.
    QspiXip,
    /// SiFive UART.
    Uart0,
    /// Main RAM (data tightly-integrated memory).
    Dtim,
}

impl DeviceId {
    /// Number of device identifiers.
    pub const COUNT: usize = 12;

    /// Every identifier in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Debug,
        Self::SystemControl,
        Self::Error,
        Self::BootRom,
        Self::TileResetControl,
        Self::Clint,
        Self::Plic,
        Self::LbwifRam,
        Self::QspiControl,
        Self::QspiXip,
        Self::Uart0,
        Self::Dtim,
    ];

    /// Returns the region name used in the address space and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::SystemControl => "system-control",
            Self::Error => "error",
            Self::BootRom => "boot-rom",
            Self::TileResetControl => "tile-reset-control",
            Self::Clint => "clint",
            Self::Plic => "plic",
            Self::LbwifRam => "lbwif-ram",
            Self::QspiControl => "qspi-control",
            Self::QspiXip => "qspi-xip",
            Self::Uart0 => "uart0",
            Self::Dtim => "dtim",
        }
    }

    /// Returns the table slot of this identifier.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemMapEntry {
    /// Device occupying the range.
    pub device: DeviceId,
    /// First byte of the range.
    pub base: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl MemMapEntry {
    /// Creates an entry.
    pub const fn new(device: DeviceId, base: u64, size: u64) -> Self {
        Self { device, base, size }
    }

    /// Returns the exclusive end of the range, or `None` if it wraps past `u64::MAX`.
    pub const fn end(&self) -> Option<u64> {
        self.base.checked_add(self.size)
    }

    /// Returns whether `addr` lies inside the range.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    /// Returns whether the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.size == 0 || other.size == 0 {
            return false;
        }
        // Differences stay in range even when an end would wrap.
        if self.base <= other.base {
            other.base - self.base < self.size
        } else {
            self.base - other.base < other.size
        }
    }
}

/// The full table, indexed by `DeviceId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemMap {
    entries: [MemMapEntry; DeviceId::COUNT],
}

impl MemMap {
    /// Wraps a table; call `validate` before using it.
    pub const fn new(entries: [MemMapEntry; DeviceId::COUNT]) -> Self {
        Self { entries }
    }

    /// Returns the entry for `device`.
    pub const fn entry(&self, device: DeviceId) -> MemMapEntry {
        self.entries[device.index()]
    }

    /// Returns the base address of `device`.
    pub const fn base(&self, device: DeviceId) -> u64 {
        self.entry(device).base
    }

    /// Returns the size of `device`'s window.
    pub const fn size(&self, device: DeviceId) -> u64 {
        self.entry(device).size
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &MemMapEntry> {
        self.entries.iter()
    }

    /// Returns the entry whose range contains `addr`.
    pub fn lookup(&self, addr: u64) -> Option<&MemMapEntry> {
        self.entries.iter().find(|e| e.contains(addr))
    }

    /// Checks the table invariants.
    ///
    /// # Errors
    ///
    /// * `ConfigError::MisplacedEntry` if slot `i` does not hold device `i`.
    /// * `ConfigError::EmptyRegion` for a zero-size entry.
    /// * `ConfigError::RegionOverflow` for an entry that wraps the address space.
    /// * `ConfigError::OverlappingRegions` for the first overlapping pair in table order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, (entry, expected)) in self.entries.iter().zip(DeviceId::ALL).enumerate() {
            if entry.device != expected {
                return Err(ConfigError::MisplacedEntry {
                    index,
                    expected,
                    found: entry.device,
                });
            }
            if entry.size == 0 {
                return Err(ConfigError::EmptyRegion(entry.device));
            }
            if entry.end().is_none() {
                return Err(ConfigError::RegionOverflow {
                    device: entry.device,
                    base: entry.base,
                    size: entry.size,
                });
            }
        }

        for (i, first) in self.entries.iter().enumerate() {
            for second in &self.entries[i + 1..] {
                if first.overlaps(second) {
                    return Err(ConfigError::OverlappingRegions {
                        first: first.device,
                        first_base: first.base,
                        first_end: first.base + first.size,
                        second: second.device,
                        second_base: second.base,
                        second_end: second.base + second.size,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for MemMap {
    fn default() -> Self {
        OSCIBEAR_MEMMAP
    }
}

/// The OsciBear memory map.
///
/// The PLIC window is larger than the controller's register footprint; it is kept as
/// published for the board.
pub const OSCIBEAR_MEMMAP: MemMap = MemMap::new([
    MemMapEntry::new(DeviceId::Debug, 0x0, 0x1000),
    MemMapEntry::new(DeviceId::SystemControl, 0x2000, 0x1000),
    MemMapEntry::new(DeviceId::Error, 0x3000, 0x1000),
    MemMapEntry::new(DeviceId::BootRom, 0x1_0000, 0x1_0000),
    MemMapEntry::new(DeviceId::TileResetControl, 0x10_0000, 0x1000),
    MemMapEntry::new(DeviceId::Clint, 0x200_0000, 0x1_0000),
    MemMapEntry::new(DeviceId::Plic, 0xc00_0000, 0x400_0000),
    MemMapEntry::new(DeviceId::LbwifRam, 0x1000_0000, 0x1000),
    MemMapEntry::new(DeviceId::QspiControl, 0x1004_0000, 0x1000),
    MemMapEntry::new(DeviceId::QspiXip, 0x2000_0000, 0x10_0000),
    MemMapEntry::new(DeviceId::Uart0, 0x5400_0000, 0x1000),
    MemMapEntry::new(DeviceId::Dtim, 0x8000_0000, 0x8000_8000),
]);
