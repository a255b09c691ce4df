//! Error taxonomy for machine construction.
//!
//! This module defines the errors that abort machine construction. It provides:
//! 1. **Configuration errors:** Detected before any device is created (hart count, memory map, RAM size).
//! 2. **Realization errors:** Raised while devices are created, wired, and mapped.
//! 3. **Boot-image errors:** Raised while reading and placing firmware into RAM.
//! 4. **Machine errors:** A wrapper naming which bootstrap stage failed.
//!
//! None of these are retried: any error leaves no machine behind.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::core::HartInput;
use crate::soc::SocState;
use crate::soc::memmap::DeviceId;

/// An `io::Error` behind an `Arc`, so errors carrying it stay `Clone` and comparable.
///
/// Two values are equal when their `io::ErrorKind`s match.
#[derive(Debug, Clone)]
pub struct SharedIoError(Arc<io::Error>);

impl SharedIoError {
    /// Returns the kind of the underlying error.
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }
}

impl From<io::Error> for SharedIoError {
    fn from(err: io::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl PartialEq for SharedIoError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for SharedIoError {}

impl fmt::Display for SharedIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl StdError for SharedIoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Configuration errors; always fatal and detected at composition start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// More harts were requested than the topology supports.
    #[error("requested {requested} harts but this machine supports at most {max}")]
    TooManyHarts {
        /// Number of harts requested by the configuration.
        requested: usize,
        /// Topology maximum.
        max: usize,
    },

    /// Zero harts were requested.
    #[error("at least one hart is required")]
    NoHarts,

    /// The hart array was configured twice.
    #[error("hart array is already configured")]
    HartsAlreadyConfigured,

    /// Two memory-map entries claim overlapping address ranges.
    #[error(
        "memory map entries {first} [{first_base:#x}, {first_end:#x}) and {second} [{second_base:#x}, {second_end:#x}) overlap"
    )]
    OverlappingRegions {
        /// First device in table order.
        first: DeviceId,
        /// Base of the first device.
        first_base: u64,
        /// Exclusive end of the first device.
        first_end: u64,
        /// Second device in table order.
        second: DeviceId,
        /// Base of the second device.
        second_base: u64,
        /// Exclusive end of the second device.
        second_end: u64,
    },

    /// A memory-map entry has zero size.
    #[error("memory map entry {0} has zero size")]
    EmptyRegion(DeviceId),

    /// A memory-map entry extends past the end of the 64-bit address space.
    #[error("memory map entry {device} at {base:#x} with size {size:#x} wraps the address space")]
    RegionOverflow {
        /// Offending device.
        device: DeviceId,
        /// Its base address.
        base: u64,
        /// Its size.
        size: u64,
    },

    /// Slot `index` of the table holds the wrong device.
    #[error("memory map slot {index} holds {found}, expected {expected}")]
    MisplacedEntry {
        /// Table slot.
        index: usize,
        /// Device id the slot must hold.
        expected: DeviceId,
        /// Device id actually found.
        found: DeviceId,
    },

    /// RAM size is zero.
    #[error("RAM size must be non-zero")]
    EmptyRam,

    /// RAM size exceeds the window reserved for it in the memory map.
    #[error("RAM size {size:#x} exceeds the {limit:#x}-byte window at {base:#x}")]
    RamTooLarge {
        /// Requested RAM size.
        size: u64,
        /// Window size from the memory map.
        limit: u64,
        /// Window base from the memory map.
        base: u64,
    },

    /// CPU type string did not name a known core.
    #[error("unknown CPU type `{0}`")]
    UnknownCpuType(String),

    /// Serial backend string did not name a known backend.
    #[error("unknown serial backend `{0}`")]
    UnknownSerialBackend(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: SharedIoError,
    },

    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A factory for the device is already registered.
    #[error("a factory for {0} is already registered")]
    DuplicateFactory(DeviceId),
}

/// Realization errors; raised while the composer creates and wires devices.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealizeError {
    /// A device rejected its construction parameters.
    #[error("{device}: {reason}")]
    InvalidParameter {
        /// Device that failed.
        device: DeviceId,
        /// What was wrong.
        reason: String,
    },

    /// The device has already been created for this machine.
    #[error("{0} has already been created")]
    AlreadyCreated(DeviceId),

    /// No factory is registered for the device.
    #[error("no factory registered for {0}")]
    MissingFactory(DeviceId),

    /// The composer was driven out of order.
    #[error("SoC is in state {actual:?}, expected {expected:?}")]
    InvalidState {
        /// State the operation requires.
        expected: SocState,
        /// State the composer is in.
        actual: SocState,
    },

    /// The hart array was realized before being configured.
    #[error("hart array must be configured before it is realized")]
    HartsNotConfigured,

    /// The hart array was realized twice.
    #[error("hart array is already realized")]
    HartsAlreadyRealized,

    /// Per-hart wiring was attempted before the hart array was realized.
    #[error("hart array must be realized before per-hart interrupts are wired")]
    HartsNotRealized,

    /// An interrupt source was wired before any controller was attached.
    #[error("{device}.{line}: no interrupt controller is attached")]
    NoController {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
    },

    /// A second interrupt controller was attached.
    #[error("interrupt controller {existing} is already attached; cannot attach {device}")]
    ControllerAlreadyAttached {
        /// Controller already attached.
        existing: DeviceId,
        /// Controller that was refused.
        device: DeviceId,
    },

    /// Slot 0 of the controller is reserved.
    #[error("{device}.{line}: interrupt slot 0 is reserved")]
    ReservedSlot {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
    },

    /// The slot number is beyond the controller's source capacity.
    #[error("{device}.{line}: slot {slot} exceeds controller capacity of {capacity} sources")]
    SlotOutOfRange {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
        /// Requested slot.
        slot: u32,
        /// Number of sources the controller has, including reserved slot 0.
        capacity: u32,
    },

    /// The slot is already driven by another source.
    #[error("{device}.{line}: slot {slot} is already driven by {owner}.{owner_line}")]
    SlotInUse {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
        /// Requested slot.
        slot: u32,
        /// Device already driving the slot.
        owner: DeviceId,
        /// Line already driving the slot.
        owner_line: &'static str,
    },

    /// Every non-reserved slot of the controller is in use.
    #[error("{device}.{line}: all {capacity} controller slots are in use")]
    ControllerFull {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
        /// Number of sources the controller has, including reserved slot 0.
        capacity: u32,
    },

    /// The hart index does not exist.
    #[error("{device}.{line}: hart {hart} does not exist ({num_harts} harts realized)")]
    NoSuchHart {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
        /// Requested hart index.
        hart: usize,
        /// Number of realized harts.
        num_harts: usize,
    },

    /// The hart interrupt input is already driven.
    #[error("{device}.{line}: hart {hart} input {input} is already driven by {owner}")]
    HartInputInUse {
        /// Source device.
        device: DeviceId,
        /// Output line name.
        line: &'static str,
        /// Hart index.
        hart: usize,
        /// Hart input.
        input: HartInput,
        /// Device already driving the input.
        owner: DeviceId,
    },

    /// A region overlaps one already present in the address space.
    #[error("region {name} [{base:#x}, +{size:#x}) overlaps {other}")]
    RegionOverlap {
        /// Region being added.
        name: String,
        /// Its base.
        base: u64,
        /// Its size.
        size: u64,
        /// Region already mapped there.
        other: String,
    },

    /// Backing memory could not be allocated.
    #[error("failed to allocate {size:#x} bytes of backing memory for {name}")]
    Allocation {
        /// Region name.
        name: String,
        /// Requested size.
        size: u64,
    },
}

/// Bus access error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The access range is not fully backed by a single region.
    #[error("range [{addr:#x}, +{len:#x}) is not backed by a single region")]
    Unmapped {
        /// Start of the access.
        addr: u64,
        /// Length of the access in bytes.
        len: u64,
    },
}

/// Boot-image errors; reported before any hart executes.
#[derive(Debug, Error)]
pub enum BootImageError {
    /// The image file could not be read.
    #[error("failed to read boot image {path}")]
    Unreadable {
        /// Image path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The image file is empty.
    #[error("boot image {path} is empty")]
    Empty {
        /// Image path.
        path: PathBuf,
    },

    /// The image looks like an ELF file but could not be parsed.
    #[error("boot image {path} is malformed: {reason}")]
    Malformed {
        /// Image path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The image does not fit in the RAM window.
    #[error("boot image {path} ({size:#x} bytes) does not fit in the {limit:#x}-byte RAM window at {base:#x}")]
    TooLarge {
        /// Image path.
        path: PathBuf,
        /// Image size.
        size: u64,
        /// RAM base.
        base: u64,
        /// RAM size.
        limit: u64,
    },

    /// An ELF segment lies outside the RAM window.
    #[error("boot image {path}: segment [{addr:#x}, +{len:#x}) lies outside RAM [{base:#x}, {end:#x})")]
    SegmentOutOfRange {
        /// Image path.
        path: PathBuf,
        /// Segment physical address.
        addr: u64,
        /// Segment memory size.
        len: u64,
        /// RAM base.
        base: u64,
        /// RAM exclusive end.
        end: u64,
    },

    /// The ELF entry point lies outside the RAM window.
    #[error("boot image {path}: entry point {entry:#x} lies outside RAM [{base:#x}, {end:#x})")]
    EntryOutOfRange {
        /// Image path.
        path: PathBuf,
        /// Declared entry point.
        entry: u64,
        /// RAM base.
        base: u64,
        /// RAM exclusive end.
        end: u64,
    },

    /// Writing the image into the address space failed.
    #[error("boot image {path}: {source}")]
    Write {
        /// Image path.
        path: PathBuf,
        /// Bus error.
        #[source]
        source: BusError,
    },
}

/// Fatal machine-construction error; names the stage that failed.
#[derive(Debug, Error)]
pub enum MachineError {
    /// Configuration was rejected before composition began.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A device failed to realize.
    #[error("SoC realization failed: {0}")]
    Realize(#[from] RealizeError),

    /// The boot image could not be loaded.
    #[error("boot image error: {0}")]
    BootImage(#[from] BootImageError),
}
