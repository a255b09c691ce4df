//! System-on-Chip (SoC) Components.
//!
//! This module organizes the components that make up the OsciBear machine:
//! the memory map, the address space, the device models, the interrupt fabric,
//! the device registry, and the composer that assembles them in order.

/// OsciBear topology constants and default device factories.
pub mod board;

/// Composition state machine.
pub mod composer;

/// Memory-mapped I/O device implementations.
pub mod devices;

/// Static interrupt wiring.
pub mod fabric;

/// Address space and access routing.
pub mod interconnect;

/// Shared level-sensitive interrupt lines.
pub mod irq;

/// Static memory-map table.
pub mod memmap;

/// RAM regions.
pub mod memory;

/// Device factories keyed by memory-map identifier.
pub mod registry;

/// Device trait definitions for MMIO access.
pub mod traits;

pub use composer::{DeviceHandle, Soc, SocState};
pub use fabric::{InterruptFabric, IrqBinding, IrqSink};
pub use interconnect::{Bus, RegionInfo};
pub use irq::IrqLine;
pub use memmap::{DeviceId, MemMap, MemMapEntry, OSCIBEAR_MEMMAP};
pub use registry::{DeviceFactory, DeviceRegistry, RealizeContext};
