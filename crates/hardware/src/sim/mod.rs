//! Machine bootstrap and boot-image loading.
//!
//! Turns a `Config` into a composed machine and places the boot image into RAM.

/// ELF and raw boot-image loading.
pub mod loader;

/// Top-level machine construction.
pub mod machine;

pub use loader::{ImageFormat, LoadedImage, Placement, load_boot_image};
pub use machine::Machine;
