//! Advanced Core Local Interruptor (ACLINT).
//!
//! The CLINT window is split into two ACLINT blocks:
//! 1. **SWI (MSWI):** One `msip` word per hart at `4 * hart`; bit 0 drives the hart's
//!    machine-software input.
//! 2. **MTIMER:** One `mtimecmp` doubleword per hart and a shared `mtime` counter; the
//!    hart's machine-timer input is raised while `mtime >= mtimecmp`.
//!
//! # Memory Map (relative to each block)
//!
//! * SWI `0x0000`: MSIP (hart 0)
//! * MTIMER `0x0000`: MTIMECMP (hart 0)
//! * MTIMER `0x7FF8`: MTIME

use crate::common::RealizeError;
use crate::soc::devices::Device;
use crate::soc::irq::IrqLine;
use crate::soc::memmap::DeviceId;

/// ACLINT software-interrupt block.
#[derive(Debug)]
pub struct AclintSwi {
    base_addr: u64,
    size: u64,
    /// Machine software interrupt pending, per hart.
    msip: Vec<u32>,
    outputs: Vec<IrqLine>,
}

impl AclintSwi {
    /// Creates the block.
    ///
    /// # Arguments
    ///
    /// * `base_addr` - The base physical address.
    /// * `size` - Size of the register window.
    /// * `outputs` - One machine-software line per hart.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` if there are no harts or the window cannot hold
    /// one `msip` word per hart.
    pub fn new(base_addr: u64, size: u64, outputs: Vec<IrqLine>) -> Result<Self, RealizeError> {
        if outputs.is_empty() || outputs.len() as u64 * 4 > size {
            return Err(RealizeError::InvalidParameter {
                device: DeviceId::Clint,
                reason: format!(
                    "SWI window {size:#x} cannot serve {} harts",
                    outputs.len()
                ),
            });
        }
        Ok(Self {
            base_addr,
            size,
            msip: vec![0; outputs.len()],
            outputs,
        })
    }

    fn hart_of(&self, offset: u64) -> Option<usize> {
        let hart = (offset / 4) as usize;
        (offset % 4 == 0 && hart < self.msip.len()).then_some(hart)
    }
}

impl Device for AclintSwi {
    fn name(&self) -> &str {
        "clint-swi"
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.size)
    }

    fn read_u8(&mut self, offset: u64) -> u8 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u8
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u16
    }

    fn read_u32(&mut self, offset: u64) -> u32 {
        self.hart_of(offset).map_or(0, |hart| self.msip[hart])
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from(self.read_u32(offset)) | (u64::from(self.read_u32(offset + 4)) << 32)
    }

    fn write_u8(&mut self, offset: u64, val: u8) {
        if offset & 3 == 0 {
            self.write_u32(offset, u32::from(val));
        }
    }

    fn write_u16(&mut self, offset: u64, val: u16) {
        if offset & 3 == 0 {
            self.write_u32(offset, u32::from(val));
        }
    }

    /// Writes MSIP; only bit 0 is writable.
    fn write_u32(&mut self, offset: u64, val: u32) {
        if let Some(hart) = self.hart_of(offset) {
            self.msip[hart] = val & 1;
            self.outputs[hart].set_level(self.msip[hart] != 0);
        }
    }

    fn write_u64(&mut self, offset: u64, val: u64) {
        self.write_u32(offset, val as u32);
        self.write_u32(offset + 4, (val >> 32) as u32);
    }
}

/// MTIMER topology and register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtimerConfig {
    /// Number of harts served.
    pub num_harts: usize,
    /// Size of the register window.
    pub aperture_size: u64,
    /// Offset of hart 0's `mtimecmp`.
    pub timecmp_base: u64,
    /// Offset of `mtime`.
    pub time_base: u64,
    /// Simulation ticks per `mtime` increment.
    pub divider: u64,
    /// Advertised `mtime` frequency in Hz.
    pub timebase_freq: u64,
}

impl MtimerConfig {
    /// Checks that the parameters describe a consistent register layout.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` naming the first inconsistency.
    pub fn validate(&self) -> Result<(), RealizeError> {
        let invalid = |reason: String| RealizeError::InvalidParameter {
            device: DeviceId::Clint,
            reason,
        };
        if self.num_harts == 0 {
            return Err(invalid("MTIMER needs at least one hart".into()));
        }
        if self.divider == 0 {
            return Err(invalid("MTIMER tick divider must be non-zero".into()));
        }
        if self.time_base.saturating_add(8) > self.aperture_size {
            return Err(invalid(format!(
                "mtime at {:#x} lies outside the {:#x}-byte window",
                self.time_base, self.aperture_size
            )));
        }
        let timecmp_end = self
            .timecmp_base
            .saturating_add(self.num_harts as u64 * 8);
        if self.timecmp_base < self.time_base.saturating_add(8) && timecmp_end > self.time_base {
            return Err(invalid(format!(
                "mtimecmp registers [{:#x}, {timecmp_end:#x}) overlap mtime at {:#x}",
                self.timecmp_base, self.time_base
            )));
        }
        if timecmp_end > self.aperture_size {
            return Err(invalid(format!(
                "mtimecmp registers end at {timecmp_end:#x}, past the {:#x}-byte window",
                self.aperture_size
            )));
        }
        Ok(())
    }
}

/// ACLINT machine-timer block.
#[derive(Debug)]
pub struct AclintMtimer {
    base_addr: u64,
    config: MtimerConfig,
    /// Current machine time counter.
    mtime: u64,
    /// Machine time compare register, per hart.
    mtimecmp: Vec<u64>,
    /// Internal counter for the divider.
    counter: u64,
    outputs: Vec<IrqLine>,
}

impl AclintMtimer {
    /// Creates the block.
    ///
    /// # Arguments
    ///
    /// * `base_addr` - The base physical address.
    /// * `config` - Register layout and tick divider.
    /// * `outputs` - One machine-timer line per hart.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` if `config` is inconsistent or `outputs` does not
    /// hold one line per hart.
    pub fn new(
        base_addr: u64,
        config: MtimerConfig,
        outputs: Vec<IrqLine>,
    ) -> Result<Self, RealizeError> {
        config.validate()?;
        if outputs.len() != config.num_harts {
            return Err(RealizeError::InvalidParameter {
                device: DeviceId::Clint,
                reason: format!(
                    "{} timer lines for {} harts",
                    outputs.len(),
                    config.num_harts
                ),
            });
        }
        Ok(Self {
            base_addr,
            config,
            mtime: 0,
            mtimecmp: vec![u64::MAX; config.num_harts],
            counter: 0,
            outputs,
        })
    }

    /// Returns the current `mtime`.
    pub const fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Returns the advertised timer frequency.
    pub const fn timebase_freq(&self) -> u64 {
        self.config.timebase_freq
    }

    fn update_outputs(&self) {
        for (cmp, line) in self.mtimecmp.iter().zip(&self.outputs) {
            line.set_level(self.mtime >= *cmp);
        }
    }

    fn timecmp_of(&self, offset: u64) -> Option<usize> {
        let rel = offset.checked_sub(self.config.timecmp_base)?;
        let hart = (rel / 8) as usize;
        (hart < self.mtimecmp.len()).then_some(hart)
    }
}

impl Device for AclintMtimer {
    fn name(&self) -> &str {
        "clint-mtimer"
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.config.aperture_size)
    }

    /// Reads a byte from the device.
    ///
    /// Delegates to `read_u64` and extracts the appropriate byte.
    fn read_u8(&mut self, offset: u64) -> u8 {
        let val = self.read_u64(offset & !7);
        let shift = (offset & 7) * 8;
        ((val >> shift) & 0xFF) as u8
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        let val = self.read_u64(offset & !7);
        ((val >> ((offset & 6) * 8)) & 0xFFFF) as u16
    }

    /// Reads the lower or upper half of MTIME or an MTIMECMP.
    fn read_u32(&mut self, offset: u64) -> u32 {
        let val = self.read_u64(offset & !7);
        if offset & 4 == 0 {
            val as u32
        } else {
            (val >> 32) as u32
        }
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        if offset == self.config.time_base {
            return self.mtime;
        }
        match self.timecmp_of(offset) {
            Some(hart) if (offset - self.config.timecmp_base) % 8 == 0 => self.mtimecmp[hart],
            _ => 0,
        }
    }

    /// Writes a byte (unimplemented).
    fn write_u8(&mut self, _offset: u64, _val: u8) {}
    /// Writes a half-word (unimplemented).
    fn write_u16(&mut self, _offset: u64, _val: u16) {}

    /// Writes the lower or upper half of MTIME or an MTIMECMP.
    fn write_u32(&mut self, offset: u64, val: u32) {
        let aligned = offset & !7;
        let old = self.read_u64(aligned);
        let new = if offset & 4 == 0 {
            (old & 0xFFFF_FFFF_0000_0000) | u64::from(val)
        } else {
            (old & 0x0000_0000_FFFF_FFFF) | (u64::from(val) << 32)
        };
        self.write_u64(aligned, new);
    }

    fn write_u64(&mut self, offset: u64, val: u64) {
        if offset == self.config.time_base {
            self.mtime = val;
        } else if let Some(hart) = self.timecmp_of(offset) {
            if (offset - self.config.timecmp_base) % 8 != 0 {
                return;
            }
            self.mtimecmp[hart] = val;
        } else {
            return;
        }
        self.update_outputs();
    }

    /// Advances the device state by one tick.
    ///
    /// Increments `mtime` every `divider` ticks and re-evaluates the timer lines.
    fn tick(&mut self) {
        self.counter += 1;
        if self.counter >= self.config.divider {
            self.mtime = self.mtime.wrapping_add(1);
            self.counter = 0;
        }
        self.update_outputs();
    }
}
