//! Common types used throughout the SoC model.
//!
//! The only shared building block is the error taxonomy: configuration errors detected
//! before anything is built, realization errors raised while devices are created and
//! wired, and boot-image errors raised while placing firmware into RAM.

/// Error types for configuration, realization, bus access, and boot loading.
pub mod error;

pub use error::{BootImageError, BusError, ConfigError, MachineError, RealizeError, SharedIoError};
