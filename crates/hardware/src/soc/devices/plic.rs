//! Platform-Level Interrupt Controller (PLIC).
//!
//! The PLIC arbitrates global external interrupts and distributes them to
//! interrupt targets (hart contexts). Register layout is parameterized by
//! `PlicConfig`; the SiFive E-series layout is:
//!
//! # Memory Map
//!
//! * `0x000004`: Interrupt Priorities (source 1 onward)
//! * `0x001000`: Interrupt Pending Bits
//! * `0x002000`: Interrupt Enables (stride `0x80` per context)
//! * `0x200000`: Priority Thresholds and Claim/Complete Registers (stride `0x1000` per context)
//!
//! Gateways are level-triggered: a source is pending while its line is raised and it is
//! not claimed. A completed source that is still raised becomes pending again.

use crate::common::RealizeError;
use crate::core::HartInput;
use crate::soc::devices::Device;
use crate::soc::irq::IrqLine;
use crate::soc::memmap::DeviceId;

/// Largest number of sources (including reserved source 0) the register layout allows.
pub const MAX_SOURCES: u32 = 1024;

/// Privilege level served by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Machine mode; drives the hart's `meip`.
    Machine,
    /// Supervisor mode; drives the hart's `seip`.
    Supervisor,
}

impl ContextMode {
    /// Returns the hart input this context drives.
    pub const fn hart_input(self) -> HartInput {
        match self {
            Self::Machine => HartInput::MachineExternal,
            Self::Supervisor => HartInput::SupervisorExternal,
        }
    }

    /// Returns the name of the output line for this context.
    pub const fn line_name(self) -> &'static str {
        match self {
            Self::Machine => "meip",
            Self::Supervisor => "seip",
        }
    }

    /// Parses a per-hart context string such as `"M"` or `"MS"`.
    pub fn parse_hart_config(config: &str) -> Option<Vec<Self>> {
        if config.is_empty() {
            return None;
        }
        config
            .chars()
            .map(|c| match c {
                'M' => Some(Self::Machine),
                'S' => Some(Self::Supervisor),
                _ => None,
            })
            .collect()
    }
}

/// PLIC topology and register layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlicConfig {
    /// Number of harts served.
    pub num_harts: usize,
    /// Contexts per hart, in register order.
    pub hart_modes: Vec<ContextMode>,
    /// Number of sources, including reserved source 0.
    pub num_sources: u32,
    /// Highest priority level.
    pub num_priorities: u32,
    /// Offset of source 1's priority register.
    pub priority_base: u64,
    /// Offset of the pending bitmap.
    pub pending_base: u64,
    /// Offset of context 0's enable bitmap.
    pub enable_base: u64,
    /// Distance between enable bitmaps.
    pub enable_stride: u64,
    /// Offset of context 0's threshold register.
    pub context_base: u64,
    /// Distance between context register blocks.
    pub context_stride: u64,
    /// Size of the mapped window.
    pub aperture_size: u64,
}

impl PlicConfig {
    /// SiFive E-series parameters: 53 sources, 7 priorities, contexts per hart taken from
    /// `hart_config` (e.g. `"M"`).
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` if `hart_config` is empty or names an unknown mode.
    pub fn sifive_e(
        num_harts: usize,
        hart_config: &str,
        aperture_size: u64,
    ) -> Result<Self, RealizeError> {
        let hart_modes =
            ContextMode::parse_hart_config(hart_config).ok_or_else(|| {
                RealizeError::InvalidParameter {
                    device: DeviceId::Plic,
                    reason: format!("invalid hart config {hart_config:?}"),
                }
            })?;
        Ok(Self {
            num_harts,
            hart_modes,
            num_sources: 53,
            num_priorities: 7,
            priority_base: 0x04,
            pending_base: 0x1000,
            enable_base: 0x2000,
            enable_stride: 0x80,
            context_base: 0x20_0000,
            context_stride: 0x1000,
            aperture_size,
        })
    }

    /// Returns the total number of contexts.
    pub fn num_contexts(&self) -> usize {
        self.num_harts * self.hart_modes.len()
    }

    /// Number of 32-bit words in the pending and enable bitmaps.
    const fn bitmap_words(&self) -> usize {
        self.num_sources.div_ceil(32) as usize
    }

    /// Checks that the parameters describe a consistent register layout.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` naming the first inconsistency.
    pub fn validate(&self) -> Result<(), RealizeError> {
        let invalid = |reason: String| RealizeError::InvalidParameter {
            device: DeviceId::Plic,
            reason,
        };
        if self.num_harts == 0 || self.hart_modes.is_empty() {
            return Err(invalid("at least one context is required".into()));
        }
        if !(2..=MAX_SOURCES).contains(&self.num_sources) {
            return Err(invalid(format!(
                "source count {} outside 2..={MAX_SOURCES}",
                self.num_sources
            )));
        }
        if self.num_priorities == 0 {
            return Err(invalid("at least one priority level is required".into()));
        }
        if self.enable_stride == 0 || self.context_stride == 0 {
            return Err(invalid("register strides must be non-zero".into()));
        }

        let words = self.bitmap_words() as u64;
        let contexts = self.num_contexts() as u64;
        let priority_end = self
            .priority_base
            .saturating_add(u64::from(self.num_sources - 1) * 4);
        if priority_end > self.pending_base {
            return Err(invalid(format!(
                "priority registers end at {priority_end:#x}, past pending base {:#x}",
                self.pending_base
            )));
        }
        if self.pending_base.saturating_add(words * 4) > self.enable_base {
            return Err(invalid("pending bitmap overlaps enable registers".into()));
        }
        if self.enable_stride < words * 4 {
            return Err(invalid(format!(
                "enable stride {:#x} cannot hold {} sources",
                self.enable_stride, self.num_sources
            )));
        }
        let enable_end = self
            .enable_base
            .saturating_add(contexts.saturating_mul(self.enable_stride));
        if enable_end > self.context_base {
            return Err(invalid("enable registers overlap context registers".into()));
        }
        if self.context_stride < 8 {
            return Err(invalid("context stride must cover threshold and claim".into()));
        }
        let context_end = self
            .context_base
            .saturating_add(contexts.saturating_mul(self.context_stride));
        if context_end > self.aperture_size {
            return Err(invalid(format!(
                "context registers end at {context_end:#x}, past aperture {:#x}",
                self.aperture_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Context {
    enables: Vec<u32>,
    threshold: u32,
    output: IrqLine,
}

/// PLIC device structure.
#[derive(Debug)]
pub struct Plic {
    /// Base physical address of the device.
    base_addr: u64,
    config: PlicConfig,
    /// Source priorities, indexed by source number.
    priorities: Vec<u32>,
    /// Pending bits (bitmap).
    pending: Vec<u32>,
    /// Claimed-but-not-completed bits (bitmap).
    claimed: Vec<u32>,
    /// Input line per source; index 0 is never sampled.
    sources: Vec<IrqLine>,
    contexts: Vec<Context>,
}

fn bit(words: &[u32], id: u32) -> bool {
    words[(id / 32) as usize] & (1 << (id % 32)) != 0
}

fn set_bit(words: &mut [u32], id: u32, value: bool) {
    let mask = 1 << (id % 32);
    if value {
        words[(id / 32) as usize] |= mask;
    } else {
        words[(id / 32) as usize] &= !mask;
    }
}

impl Plic {
    /// Creates a PLIC.
    ///
    /// # Arguments
    ///
    /// * `base_addr` - The base physical address.
    /// * `config` - Topology and register layout.
    /// * `outputs` - One line per context, hart-major; each drives a hart's external input.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidParameter` if `config` is inconsistent or `outputs` does not
    /// hold one line per context.
    pub fn new(
        base_addr: u64,
        config: PlicConfig,
        outputs: Vec<IrqLine>,
    ) -> Result<Self, RealizeError> {
        config.validate()?;
        if outputs.len() != config.num_contexts() {
            return Err(RealizeError::InvalidParameter {
                device: DeviceId::Plic,
                reason: format!(
                    "{} output lines for {} contexts",
                    outputs.len(),
                    config.num_contexts()
                ),
            });
        }

        let words = config.bitmap_words();
        let contexts = outputs
            .into_iter()
            .map(|output| Context {
                enables: vec![0; words],
                threshold: 0,
                output,
            })
            .collect();
        Ok(Self {
            base_addr,
            priorities: vec![0; config.num_sources as usize],
            pending: vec![0; words],
            claimed: vec![0; words],
            sources: (0..config.num_sources).map(|_| IrqLine::new()).collect(),
            contexts,
            config,
        })
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &PlicConfig {
        &self.config
    }

    /// Returns the input lines, indexed by source number (index 0 is reserved).
    pub fn source_lines(&self) -> Vec<IrqLine> {
        self.sources.clone()
    }

    /// Returns whether `source` is pending.
    pub fn is_pending(&self, source: u32) -> bool {
        source < self.config.num_sources && bit(&self.pending, source)
    }

    /// Samples every source line into the gateways and updates the context outputs.
    pub fn update(&mut self) {
        for id in 1..self.config.num_sources {
            if !bit(&self.claimed, id) {
                let level = self.sources[id as usize].is_raised();
                set_bit(&mut self.pending, id, level);
            }
        }
        self.update_outputs();
    }

    fn update_outputs(&self) {
        for ctx in 0..self.contexts.len() {
            let raised = self.best_source(ctx) != 0;
            self.contexts[ctx].output.set_level(raised);
        }
    }

    /// Returns the highest-priority pending, enabled source above the context threshold.
    ///
    /// Ties go to the lowest source number.
    fn best_source(&self, ctx: usize) -> u32 {
        let context = &self.contexts[ctx];
        let mut best_prio = context.threshold;
        let mut best_id = 0;
        for id in 1..self.config.num_sources {
            if !bit(&self.pending, id) || !bit(&context.enables, id) {
                continue;
            }
            let prio = self.priorities[id as usize];
            if prio > best_prio {
                best_prio = prio;
                best_id = id;
            }
        }
        best_id
    }

    /// Claims the best source for context `ctx`; returns 0 if none qualifies.
    pub fn claim(&mut self, ctx: usize) -> u32 {
        if ctx >= self.contexts.len() {
            return 0;
        }
        let id = self.best_source(ctx);
        if id != 0 {
            set_bit(&mut self.pending, id, false);
            set_bit(&mut self.claimed, id, true);
        }
        self.update_outputs();
        id
    }

    /// Completes a claimed source, reopening its gateway.
    pub fn complete(&mut self, ctx: usize, id: u32) {
        if ctx >= self.contexts.len() || id == 0 || id >= self.config.num_sources {
            return;
        }
        if bit(&self.contexts[ctx].enables, id) {
            set_bit(&mut self.claimed, id, false);
        }
        self.update();
    }

    fn context_of_enable(&self, offset: u64) -> Option<(usize, usize)> {
        let rel = offset.checked_sub(self.config.enable_base)?;
        let ctx = (rel / self.config.enable_stride) as usize;
        let word = ((rel % self.config.enable_stride) / 4) as usize;
        (ctx < self.contexts.len() && word < self.pending.len()).then_some((ctx, word))
    }

    fn context_of_register(&self, offset: u64) -> Option<(usize, u64)> {
        let rel = offset.checked_sub(self.config.context_base)?;
        let ctx = (rel / self.config.context_stride) as usize;
        (ctx < self.contexts.len()).then_some((ctx, rel % self.config.context_stride))
    }

    fn priority_index(&self, offset: u64) -> Option<usize> {
        let rel = offset.checked_sub(self.config.priority_base)?;
        let id = rel / 4 + 1;
        (offset < self.config.pending_base && id < u64::from(self.config.num_sources))
            .then_some(id as usize)
    }
}

impl Device for Plic {
    /// Returns the device name.
    fn name(&self) -> &str {
        DeviceId::Plic.name()
    }
    /// Returns the address range (Base, Size).
    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.config.aperture_size)
    }

    /// Reads a word (32-bit) from the device.
    ///
    /// Handles reads from Priority, Pending, Enable, Threshold, and Claim registers.
    fn read_u32(&mut self, offset: u64) -> u32 {
        if offset < self.config.pending_base {
            return self.priority_index(offset).map_or(0, |id| self.priorities[id]);
        }
        if offset < self.config.enable_base {
            let word = ((offset - self.config.pending_base) / 4) as usize;
            return self.pending.get(word).copied().unwrap_or(0);
        }
        if offset < self.config.context_base {
            return self
                .context_of_enable(offset)
                .map_or(0, |(ctx, word)| self.contexts[ctx].enables[word]);
        }
        match self.context_of_register(offset) {
            Some((ctx, 0)) => self.contexts[ctx].threshold,
            Some((ctx, 4)) => self.claim(ctx),
            _ => 0,
        }
    }

    /// Writes a word (32-bit) to the device.
    ///
    /// Handles writes to Priority, Enable, Threshold, and Complete registers. Pending bits
    /// are read-only.
    fn write_u32(&mut self, offset: u64, val: u32) {
        if offset < self.config.pending_base {
            match self.priority_index(offset) {
                Some(id) if val <= self.config.num_priorities => self.priorities[id] = val,
                _ => return,
            }
        } else if offset < self.config.enable_base {
            return;
        } else if offset < self.config.context_base {
            let Some((ctx, word)) = self.context_of_enable(offset) else {
                return;
            };
            // Source 0 cannot be enabled.
            let mask = if word == 0 { !1 } else { !0 };
            self.contexts[ctx].enables[word] = val & mask;
        } else {
            match self.context_of_register(offset) {
                Some((ctx, 0)) if val <= self.config.num_priorities => {
                    self.contexts[ctx].threshold = val;
                }
                Some((ctx, 4)) => {
                    self.complete(ctx, val);
                    return;
                }
                _ => return,
            }
        }
        self.update_outputs();
    }

    /// Reads a byte (delegates to read_u32).
    fn read_u8(&mut self, offset: u64) -> u8 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u8
    }
    /// Reads a half-word (delegates to read_u32).
    fn read_u16(&mut self, offset: u64) -> u16 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u16
    }
    /// Reads a double-word (delegates to read_u32).
    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from(self.read_u32(offset))
    }

    /// Writes a byte (delegates to write_u32).
    fn write_u8(&mut self, offset: u64, val: u8) {
        self.write_u32(offset & !3, u32::from(val));
    }
    /// Writes a half-word (delegates to write_u32).
    fn write_u16(&mut self, offset: u64, val: u16) {
        self.write_u32(offset & !3, u32::from(val));
    }
    /// Writes a double-word (delegates to write_u32).
    fn write_u64(&mut self, offset: u64, val: u64) {
        self.write_u32(offset, val as u32);
    }

    /// Samples source lines and drives the context outputs.
    fn tick(&mut self) {
        self.update();
    }

    /// Returns a mutable reference to the PLIC if this device is one.
    fn as_plic_mut(&mut self) -> Option<&mut Plic> {
        Some(self)
    }
}
