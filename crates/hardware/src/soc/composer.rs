//! SoC composer.
//!
//! Drives machine construction through a strictly forward state machine:
//!
//! `Uninitialized -> CpuConfigured -> CpuRealized -> InterruptControllerReady
//!  -> PeripheralsReady -> AddressSpaceComposed`
//!
//! 1. **initialize:** Validates the memory map and configures the hart array.
//! 2. **realize:** Realizes the harts, then creates the interrupt controller, the
//!    peripherals that wire into it, and finally the remaining memory regions.
//! 3. **install_ram:** Maps main RAM once the address space is composed.
//!
//! There is no backward transition. Any error aborts construction; the composer is then
//! discarded rather than retried.

use std::fmt;

use tracing::{debug, info};

use crate::common::{ConfigError, RealizeError};
use crate::config::{Config, SystemConfig};
use crate::core::{HartArray, HartArrayConfig};
use crate::soc::board;
use crate::soc::devices::Device;
use crate::soc::fabric::InterruptFabric;
use crate::soc::interconnect::{Bus, RegionInfo};
use crate::soc::memmap::{DeviceId, MemMap};
use crate::soc::memory::Memory;
use crate::soc::registry::{DeviceRegistry, RealizeContext};

/// Composition progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SocState {
    /// Nothing configured.
    Uninitialized,
    /// Hart array configured.
    CpuConfigured,
    /// Harts realized.
    CpuRealized,
    /// Interrupt controller created and attached to the fabric.
    InterruptControllerReady,
    /// Peripherals created and wired.
    PeripheralsReady,
    /// Every mapped region is in the address space.
    AddressSpaceComposed,
}

impl fmt::Display for SocState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::CpuConfigured => "cpu-configured",
            Self::CpuRealized => "cpu-realized",
            Self::InterruptControllerReady => "interrupt-controller-ready",
            Self::PeripheralsReady => "peripherals-ready",
            Self::AddressSpaceComposed => "address-space-composed",
        })
    }
}

/// A created device and the regions it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Memory-map identifier.
    pub id: DeviceId,
    /// Regions in the address space, in ascending address order.
    pub regions: Vec<RegionInfo>,
}

impl DeviceHandle {
    /// Returns the lowest base address of the device's regions.
    pub fn base(&self) -> u64 {
        self.regions.iter().map(|r| r.base).min().unwrap_or(0)
    }
}

/// The SoC descriptor: hart array, interrupt fabric, created devices, and address space.
#[derive(Debug)]
pub struct Soc {
    state: SocState,
    memmap: MemMap,
    registry: DeviceRegistry,
    system: SystemConfig,
    harts: HartArray,
    fabric: InterruptFabric,
    bus: Bus,
    interrupt_controller: Option<DeviceHandle>,
    peripherals: Vec<DeviceHandle>,
    memory_regions: Vec<DeviceHandle>,
}

impl Soc {
    /// Creates an uninitialized composer over `memmap`, building devices from `registry`.
    pub fn new(memmap: MemMap, registry: DeviceRegistry) -> Self {
        Self {
            state: SocState::Uninitialized,
            memmap,
            registry,
            system: SystemConfig::default(),
            harts: HartArray::new(),
            fabric: InterruptFabric::new(),
            bus: Bus::new(),
            interrupt_controller: None,
            peripherals: Vec::new(),
            memory_regions: Vec::new(),
        }
    }

    /// Performs `Uninitialized -> CpuConfigured`.
    ///
    /// Every hart's reset vector is the base of main RAM.
    ///
    /// # Errors
    ///
    /// Any memory-map defect, a hart count outside `1..=MAX_HARTS`, or a second call
    /// (`ConfigError::HartsAlreadyConfigured`). Nothing is built on failure.
    pub fn initialize(&mut self, config: &Config) -> Result<(), ConfigError> {
        if self.state != SocState::Uninitialized {
            return Err(ConfigError::HartsAlreadyConfigured);
        }
        self.memmap.validate()?;
        self.harts.configure(HartArrayConfig {
            num_harts: config.general.num_harts,
            max_harts: board::MAX_HARTS,
            hartid_base: 0,
            cpu_type: config.general.cpu_type,
            reset_vector: self.memmap.base(board::MAIN_RAM),
        })?;
        self.system = config.system.clone();
        self.advance(SocState::CpuConfigured);
        Ok(())
    }

    /// Performs the remaining transitions up to `AddressSpaceComposed`.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidState` unless called right after `initialize`, or the first
    /// error raised by the hart array, a device factory, the fabric, or the address space.
    pub fn realize(&mut self) -> Result<(), RealizeError> {
        self.expect_state(SocState::CpuConfigured)?;

        self.harts.realize()?;
        self.advance(SocState::CpuRealized);

        for id in board::INTERRUPT_CONTROLLERS {
            let handle = self.create(id)?;
            self.interrupt_controller = Some(handle);
        }
        self.advance(SocState::InterruptControllerReady);

        for id in board::PERIPHERALS {
            let handle = self.create(id)?;
            self.peripherals.push(handle);
        }
        self.advance(SocState::PeripheralsReady);

        for id in board::MEMORY_REGIONS {
            let handle = self.create(id)?;
            self.memory_regions.push(handle);
        }
        self.advance(SocState::AddressSpaceComposed);
        Ok(())
    }

    /// Maps main RAM into the composed address space.
    ///
    /// # Errors
    ///
    /// `RealizeError::InvalidState` before composition completes,
    /// `RealizeError::InvalidParameter` if `ram` does not start at the main RAM base or
    /// exceeds its window, and `RealizeError::RegionOverlap` if it is installed twice.
    pub fn install_ram(&mut self, ram: Memory) -> Result<RegionInfo, RealizeError> {
        self.expect_state(SocState::AddressSpaceComposed)?;
        let window = self.memmap.entry(board::MAIN_RAM);
        let (base, size) = ram.address_range();
        if base != window.base || size > window.size {
            return Err(RealizeError::InvalidParameter {
                device: board::MAIN_RAM,
                reason: format!(
                    "RAM [{base:#x}, +{size:#x}) does not fit window [{:#x}, +{:#x})",
                    window.base, window.size
                ),
            });
        }
        let region = self.bus.add_device(Box::new(ram))?;
        info!(
            region = %region.name,
            base = format_args!("{:#x}", region.base),
            size = format_args!("{:#x}", region.size),
            "installed main RAM"
        );
        Ok(region)
    }

    fn expect_state(&self, expected: SocState) -> Result<(), RealizeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RealizeError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn advance(&mut self, next: SocState) {
        info!(from = %self.state, to = %next, "SoC state transition");
        self.state = next;
    }

    /// Runs the factory for `id` and maps everything it returns.
    fn create(&mut self, id: DeviceId) -> Result<DeviceHandle, RealizeError> {
        let entry = self.memmap.entry(id);
        let mut ctx = RealizeContext {
            entry,
            harts: &self.harts,
            fabric: &mut self.fabric,
            system: &self.system,
        };
        let devices = self.registry.create(id, &mut ctx)?;
        if devices.is_empty() {
            return Err(RealizeError::InvalidParameter {
                device: id,
                reason: "factory produced no devices".into(),
            });
        }

        let mut regions = Vec::with_capacity(devices.len());
        for dev in devices {
            let (base, size) = dev.address_range();
            let inside = base >= entry.base
                && entry
                    .end()
                    .is_some_and(|end| base.checked_add(size).is_some_and(|e| e <= end));
            if !inside {
                return Err(RealizeError::InvalidParameter {
                    device: id,
                    reason: format!(
                        "region {} [{base:#x}, +{size:#x}) lies outside its map entry",
                        dev.name()
                    ),
                });
            }
            regions.push(self.bus.add_device(dev)?);
        }
        regions.sort_by_key(|r| r.base);
        debug!(device = %id, regions = regions.len(), "created device");
        Ok(DeviceHandle { id, regions })
    }

    /// Returns the current state.
    pub const fn state(&self) -> SocState {
        self.state
    }

    /// Returns the memory map in use.
    pub const fn memmap(&self) -> &MemMap {
        &self.memmap
    }

    /// Returns the hart array.
    pub const fn harts(&self) -> &HartArray {
        &self.harts
    }

    /// Returns the hart array for reset-vector updates before execution.
    pub fn harts_mut(&mut self) -> &mut HartArray {
        &mut self.harts
    }

    /// Returns the interrupt fabric.
    pub const fn fabric(&self) -> &InterruptFabric {
        &self.fabric
    }

    /// Returns the composed address space.
    pub const fn address_space(&self) -> &Bus {
        &self.bus
    }

    /// Returns the composed address space for loading and access.
    pub fn address_space_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Returns the interrupt controller handle, once created.
    pub const fn interrupt_controller(&self) -> Option<&DeviceHandle> {
        self.interrupt_controller.as_ref()
    }

    /// Returns the peripherals created so far, in creation order.
    pub fn peripherals(&self) -> &[DeviceHandle] {
        &self.peripherals
    }

    /// Returns the ROM, RAM-window, and placeholder regions, in creation order.
    pub fn memory_regions(&self) -> &[DeviceHandle] {
        &self.memory_regions
    }

    /// Returns every created device: controller, peripherals, then memory regions.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceHandle> {
        self.interrupt_controller
            .iter()
            .chain(&self.peripherals)
            .chain(&self.memory_regions)
    }
}
