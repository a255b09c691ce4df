//! Processor cores.
//!
//! The instruction-execution model lives outside this crate. What the SoC needs from a core
//! is captured here:
//! 1. **Hart:** Identity, architectural type, reset vector, and interrupt inputs.
//! 2. **Capabilities:** `Runnable` (reset/entry control) and `Interruptible` (interrupt inputs).
//! 3. **Hart array:** The fixed-size set of harts, configured and then realized exactly once.

/// Hart array (configure/realize lifecycle).
pub mod array;

/// Single hart and its capability traits.
pub mod hart;

pub use self::array::{HartArray, HartArrayConfig};
pub use self::hart::{Hart, HartInput, HartIrqInputs, Interruptible, Runnable};
