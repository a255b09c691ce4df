//! Level-sensitive interrupt lines.
//!
//! An `IrqLine` is a shared boolean signal. The driving device and the sink hold clones of
//! the same line; the driver sets the level and the sink samples it. Lines never carry
//! edges: a source stays raised until its device lowers it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared level signal between an interrupt source and its sink.
#[derive(Clone, Default)]
pub struct IrqLine(Arc<AtomicBool>);

impl IrqLine {
    /// Creates a new, lowered line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives the line to `level`.
    pub fn set_level(&self, level: bool) {
        self.0.store(level, Ordering::Release);
    }

    /// Raises the line.
    pub fn raise(&self) {
        self.set_level(true);
    }

    /// Lowers the line.
    pub fn lower(&self) {
        self.set_level(false);
    }

    /// Returns the current level.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns whether `self` and `other` are the same physical line.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IrqLine").field(&self.is_raised()).finish()
    }
}
