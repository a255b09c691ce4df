//! Memory-Mapped IO Devices.
//!
//! This module contains the device models mapped into the OsciBear address
//! space: the interrupt controller (PLIC), the core-local timer and software
//! interrupt blocks (ACLINT), the SiFive serial port, read-only memories, and
//! placeholders for register blocks with no behavioral model.

/// ACLINT software-interrupt and machine-timer blocks.
pub mod aclint;

/// Platform-Level Interrupt Controller (PLIC).
pub mod plic;

/// Boot ROM and flash execute-in-place windows.
pub mod rom;

/// SiFive UART serial port.
pub mod uart;

/// Unmodeled register blocks.
pub mod unimp;

pub use aclint::{AclintMtimer, AclintSwi, MtimerConfig};
pub use plic::{ContextMode, Plic, PlicConfig};
pub use rom::Rom;
pub use uart::{Console, Uart};
pub use unimp::Unimplemented;

pub use crate::soc::traits::Device;
