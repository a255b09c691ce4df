//! Machine bootstrap.
//!
//! `Machine` owns a fully composed SoC. Construction performs, in order:
//! 1. **Composition start:** Validates the memory map and configures the hart array.
//! 2. **RAM check:** Rejects a zero or oversized RAM before any device exists.
//! 3. **Realization:** Creates the PLIC, the peripherals, and the remaining regions.
//! 4. **RAM install:** Allocates main RAM and maps it at the DTIM base.
//! 5. **Boot image:** Loads the configured kernel, if any, and points every hart at its entry.
//!
//! Any failure aborts construction and drops whatever was built.

use tracing::{info, warn};

use crate::common::{ConfigError, MachineError};
use crate::config::Config;
use crate::core::HartArray;
use crate::sim::loader::{self, ImageFormat, LoadedImage};
use crate::soc::board;
use crate::soc::devices::Console;
use crate::soc::interconnect::{Bus, RegionInfo};
use crate::soc::memmap::OSCIBEAR_MEMMAP;
use crate::soc::memory::Memory;
use crate::soc::registry::DeviceRegistry;
use crate::soc::Soc;

/// A composed OsciBear machine, ready for a core model to execute from the reset vector.
#[derive(Debug)]
pub struct Machine {
    soc: Soc,
    config: Config,
    ram: RegionInfo,
    boot_image: Option<LoadedImage>,
}

impl Machine {
    /// Builds the machine described by `config` with the default OsciBear devices.
    ///
    /// # Errors
    ///
    /// `MachineError` naming the stage that failed: configuration, realization, or the
    /// boot image.
    pub fn new(config: Config) -> Result<Self, MachineError> {
        let registry = board::registry(Console::from(config.system.serial));
        Self::with_registry(config, registry)
    }

    /// Builds the machine from a caller-supplied device registry.
    ///
    /// # Errors
    ///
    /// See [`Machine::new`].
    pub fn with_registry(config: Config, registry: DeviceRegistry) -> Result<Self, MachineError> {
        let mut soc = Soc::new(OSCIBEAR_MEMMAP, registry);
        soc.initialize(&config)?;

        let window = soc.memmap().entry(board::MAIN_RAM);
        let ram_size = config.memory.ram_size;
        if ram_size == 0 {
            return Err(ConfigError::EmptyRam.into());
        }
        if ram_size > window.size {
            return Err(ConfigError::RamTooLarge {
                size: ram_size,
                limit: window.size,
                base: window.base,
            }
            .into());
        }

        soc.realize()?;

        let ram = Memory::allocate(board::MAIN_RAM.name(), window.base, ram_size)?;
        let ram = soc.install_ram(ram)?;

        let boot_image = match &config.general.kernel {
            Some(path) => {
                let image =
                    loader::load_boot_image(soc.address_space_mut(), path, ram.base, ram.size)?;
                if let ImageFormat::Elf { xlen } = image.format {
                    if xlen != config.general.cpu_type.xlen() {
                        warn!(
                            image_xlen = xlen,
                            cpu = %config.general.cpu_type,
                            "boot image register width does not match the CPU type"
                        );
                    }
                }
                if soc.harts().reset_vector() != Some(image.entry) {
                    soc.harts_mut().set_reset_vector(image.entry);
                }
                Some(image)
            }
            None => None,
        };

        info!(
            harts = soc.harts().num_harts(),
            cpu = %config.general.cpu_type,
            reset_vector = format_args!("{:#x}", soc.harts().reset_vector().unwrap_or(ram.base)),
            ram_size = format_args!("{:#x}", ram.size),
            "machine ready"
        );

        Ok(Self {
            soc,
            config,
            ram,
            boot_image,
        })
    }

    /// Returns the composed SoC.
    pub const fn soc(&self) -> &Soc {
        &self.soc
    }

    /// Returns the configuration the machine was built from.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the address space.
    pub const fn bus(&self) -> &Bus {
        self.soc.address_space()
    }

    /// Returns the address space for MMIO and RAM access.
    pub fn bus_mut(&mut self) -> &mut Bus {
        self.soc.address_space_mut()
    }

    /// Returns the hart array.
    pub const fn harts(&self) -> &HartArray {
        self.soc.harts()
    }

    /// Returns the main RAM region.
    pub const fn ram_region(&self) -> &RegionInfo {
        &self.ram
    }

    /// Returns the loaded boot image, if a kernel was configured.
    pub const fn boot_image(&self) -> Option<&LoadedImage> {
        self.boot_image.as_ref()
    }

    /// Returns every mapped region in ascending address order.
    pub fn layout(&self) -> Vec<RegionInfo> {
        self.soc.address_space().regions()
    }

    /// Advances every device by one tick.
    pub fn tick(&mut self) {
        self.soc.address_space_mut().tick();
    }

    /// Advances every device by `ticks` ticks.
    pub fn run_for(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }
}
