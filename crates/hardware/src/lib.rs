//! EE290C OsciBear SoC model.
//!
//! This crate composes the static hardware topology of the OsciBear RISC-V machine:
//! 1. **Memory map:** The fixed table of device base addresses and sizes.
//! 2. **Core:** The hart array and its reset vector.
//! 3. **SoC:** Device registry, interrupt fabric, MMIO devices (PLIC, ACLINT, UART, ROM), and the composer.
//! 4. **Simulation:** Boot-image loading and the top-level machine bootstrap.

/// Common types shared across the crate (error taxonomy).
pub mod common;
/// Machine configuration (defaults, CPU types, serial backends).
pub mod config;
/// Hart array and per-hart capability traits.
pub mod core;
/// Boot-image loader and machine bootstrap.
pub mod sim;
/// System-on-chip (memory map, bus, devices, interrupt fabric, composer).
pub mod soc;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Fully composed machine; construct with `Machine::new`.
pub use crate::sim::Machine;
/// SoC composer state machine.
pub use crate::soc::Soc;
