//! Hart definition and capability traits.
//!
//! A `Hart` is the SoC-facing half of a core: it carries the reset vector handed to the
//! execution model and the interrupt input lines the interrupt fabric drives. It implements:
//! 1. **Runnable:** Reset vector, program counter, and reset.
//! 2. **Interruptible:** Per-input lines and an `mip`-style pending mask.

use std::fmt;

use crate::config::CpuType;
use crate::soc::irq::IrqLine;

/// Machine software interrupt pending bit in `mip`.
pub const MIP_MSIP: u64 = 1 << 3;
/// Machine timer interrupt pending bit in `mip`.
pub const MIP_MTIP: u64 = 1 << 7;
/// Supervisor external interrupt pending bit in `mip`.
pub const MIP_SEIP: u64 = 1 << 9;
/// Machine external interrupt pending bit in `mip`.
pub const MIP_MEIP: u64 = 1 << 11;

/// Interrupt inputs of a hart that the fabric may drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HartInput {
    /// Machine software interrupt (ACLINT SWI).
    MachineSoftware,
    /// Machine timer interrupt (ACLINT MTIMER).
    MachineTimer,
    /// Supervisor external interrupt (PLIC S-mode context).
    SupervisorExternal,
    /// Machine external interrupt (PLIC M-mode context).
    MachineExternal,
}

impl HartInput {
    /// Every hart input, in `mip` bit order.
    pub const ALL: [Self; 4] = [
        Self::MachineSoftware,
        Self::MachineTimer,
        Self::SupervisorExternal,
        Self::MachineExternal,
    ];

    /// Returns the `mip` bit this input sets while raised.
    pub const fn mip_bit(self) -> u64 {
        match self {
            Self::MachineSoftware => MIP_MSIP,
            Self::MachineTimer => MIP_MTIP,
            Self::SupervisorExternal => MIP_SEIP,
            Self::MachineExternal => MIP_MEIP,
        }
    }
}

impl fmt::Display for HartInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MachineSoftware => "msip",
            Self::MachineTimer => "mtip",
            Self::SupervisorExternal => "seip",
            Self::MachineExternal => "meip",
        })
    }
}

/// The interrupt input lines of one hart.
#[derive(Debug, Clone, Default)]
pub struct HartIrqInputs {
    msip: IrqLine,
    mtip: IrqLine,
    seip: IrqLine,
    meip: IrqLine,
}

impl HartIrqInputs {
    /// Returns the line for the given input.
    pub const fn line(&self, input: HartInput) -> &IrqLine {
        match input {
            HartInput::MachineSoftware => &self.msip,
            HartInput::MachineTimer => &self.mtip,
            HartInput::SupervisorExternal => &self.seip,
            HartInput::MachineExternal => &self.meip,
        }
    }

    /// Returns the `mip` mask of every raised input.
    pub fn pending(&self) -> u64 {
        HartInput::ALL
            .into_iter()
            .filter(|&input| self.line(input).is_raised())
            .fold(0, |mask, input| mask | input.mip_bit())
    }
}

/// Capability of a core that can be reset and started at an entry address.
pub trait Runnable {
    /// Returns the hart identifier (`mhartid`).
    fn hart_id(&self) -> u64;
    /// Returns the address the hart starts from after reset.
    fn reset_vector(&self) -> u64;
    /// Sets the reset vector; takes effect at the next reset.
    fn set_reset_vector(&mut self, addr: u64);
    /// Returns the current program counter.
    fn pc(&self) -> u64;
    /// Resets the hart: the program counter is loaded from the reset vector.
    fn reset(&mut self);
}

/// Capability of a core that has interrupt inputs.
pub trait Interruptible {
    /// Returns the line behind the given input.
    fn irq_line(&self, input: HartInput) -> &IrqLine;
    /// Returns the `mip` mask of every raised input.
    fn pending_interrupts(&self) -> u64;
}

/// A realized hart.
#[derive(Debug, Clone)]
pub struct Hart {
    hart_id: u64,
    cpu_type: CpuType,
    reset_vector: u64,
    pc: u64,
    irq: HartIrqInputs,
}

impl Hart {
    /// Creates a hart held in reset at `reset_vector`.
    pub fn new(hart_id: u64, cpu_type: CpuType, reset_vector: u64) -> Self {
        Self {
            hart_id,
            cpu_type,
            reset_vector,
            pc: reset_vector,
            irq: HartIrqInputs::default(),
        }
    }

    /// Returns the architectural type of this hart.
    pub const fn cpu_type(&self) -> CpuType {
        self.cpu_type
    }

    /// Returns all interrupt input lines.
    pub const fn irq_inputs(&self) -> &HartIrqInputs {
        &self.irq
    }
}

impl Runnable for Hart {
    fn hart_id(&self) -> u64 {
        self.hart_id
    }

    fn reset_vector(&self) -> u64 {
        self.reset_vector
    }

    fn set_reset_vector(&mut self, addr: u64) {
        self.reset_vector = addr;
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    fn reset(&mut self) {
        self.pc = self.reset_vector;
    }
}

impl Interruptible for Hart {
    fn irq_line(&self, input: HartInput) -> &IrqLine {
        self.irq.line(input)
    }

    fn pending_interrupts(&self) -> u64 {
        self.irq.pending()
    }
}
