//! Hart array.
//!
//! Owns the fixed-size set of harts for the topology. The array moves through
//! `Unconfigured -> Configured -> Realized`: `configure` validates the core count against
//! the topology maximum and records the shared type and reset vector, `realize` creates
//! the harts. Per-hart interrupt wiring needs the realized array.

use tracing::debug;

use crate::common::{ConfigError, RealizeError};
use crate::config::CpuType;
use crate::core::hart::{Hart, Runnable};

/// Parameters for `HartArray::configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HartArrayConfig {
    /// Number of harts to create.
    pub num_harts: usize,
    /// Largest number of harts the topology supports.
    pub max_harts: usize,
    /// `mhartid` of the first hart.
    pub hartid_base: u64,
    /// Architectural type shared by every hart.
    pub cpu_type: CpuType,
    /// Address every hart starts from after reset.
    pub reset_vector: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Unconfigured,
    Configured(HartArrayConfig),
    Realized(HartArrayConfig),
}

/// The harts of the machine.
#[derive(Debug)]
pub struct HartArray {
    stage: Stage,
    harts: Vec<Hart>,
}

impl Default for HartArray {
    fn default() -> Self {
        Self::new()
    }
}

impl HartArray {
    /// Creates an unconfigured, empty array.
    pub const fn new() -> Self {
        Self {
            stage: Stage::Unconfigured,
            harts: Vec::new(),
        }
    }

    /// Records the core count, type, and reset vector.
    ///
    /// # Errors
    ///
    /// `ConfigError::NoHarts` for a zero count, `ConfigError::TooManyHarts` when the count
    /// exceeds `max_harts`, and `ConfigError::HartsAlreadyConfigured` on a second call.
    pub fn configure(&mut self, config: HartArrayConfig) -> Result<(), ConfigError> {
        if self.stage != Stage::Unconfigured {
            return Err(ConfigError::HartsAlreadyConfigured);
        }
        if config.num_harts == 0 {
            return Err(ConfigError::NoHarts);
        }
        if config.num_harts > config.max_harts {
            return Err(ConfigError::TooManyHarts {
                requested: config.num_harts,
                max: config.max_harts,
            });
        }
        self.stage = Stage::Configured(config);
        Ok(())
    }

    /// Instantiates the configured harts, each held in reset at the reset vector.
    ///
    /// # Errors
    ///
    /// `RealizeError::HartsNotConfigured` before `configure`, and
    /// `RealizeError::HartsAlreadyRealized` on a second call.
    pub fn realize(&mut self) -> Result<(), RealizeError> {
        let config = match self.stage {
            Stage::Unconfigured => return Err(RealizeError::HartsNotConfigured),
            Stage::Realized(_) => return Err(RealizeError::HartsAlreadyRealized),
            Stage::Configured(config) => config,
        };

        self.harts = (0..config.num_harts as u64)
            .map(|i| {
                let hart_id = config.hartid_base + i;
                debug!(
                    hart_id,
                    cpu_type = %config.cpu_type,
                    reset_vector = format_args!("{:#x}", config.reset_vector),
                    "realized hart"
                );
                Hart::new(hart_id, config.cpu_type, config.reset_vector)
            })
            .collect();
        self.stage = Stage::Realized(config);
        Ok(())
    }

    /// Returns whether `realize` has completed.
    pub const fn is_realized(&self) -> bool {
        matches!(self.stage, Stage::Realized(_))
    }

    /// Returns the configured number of harts, or 0 before `configure`.
    pub const fn num_harts(&self) -> usize {
        match self.stage {
            Stage::Unconfigured => 0,
            Stage::Configured(config) | Stage::Realized(config) => config.num_harts,
        }
    }

    /// Returns the shared architectural type, if configured.
    pub const fn cpu_type(&self) -> Option<CpuType> {
        match self.stage {
            Stage::Unconfigured => None,
            Stage::Configured(config) | Stage::Realized(config) => Some(config.cpu_type),
        }
    }

    /// Returns the shared reset vector, if configured.
    pub const fn reset_vector(&self) -> Option<u64> {
        match self.stage {
            Stage::Unconfigured => None,
            Stage::Configured(config) | Stage::Realized(config) => Some(config.reset_vector),
        }
    }

    /// Moves every hart's reset vector to `addr` and resets it there.
    ///
    /// Used by the bootstrap when the boot image declares its own entry point; must happen
    /// before execution begins.
    pub fn set_reset_vector(&mut self, addr: u64) {
        match &mut self.stage {
            Stage::Unconfigured => {}
            Stage::Configured(config) | Stage::Realized(config) => config.reset_vector = addr,
        }
        for hart in &mut self.harts {
            hart.set_reset_vector(addr);
            hart.reset();
        }
    }

    /// Returns the realized harts (empty before `realize`).
    pub fn harts(&self) -> &[Hart] {
        &self.harts
    }

    /// Returns the hart at `index`.
    pub fn hart(&self, index: usize) -> Option<&Hart> {
        self.harts.get(index)
    }
}
