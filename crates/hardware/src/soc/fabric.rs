//! Interrupt fabric.
//!
//! Static wiring of interrupt sources to sinks, recorded while devices are realized:
//! 1. **Controller slots:** A peripheral output line is bound to one numbered input of the
//!    interrupt controller. Slot 0 is reserved and each slot has at most one source.
//! 2. **Hart inputs:** Controller contexts and core-local devices (ACLINT) are bound directly
//!    to a hart's interrupt input. Each hart input has exactly one driver.
//!
//! Every successful bind hands back the shared `IrqLine` the source must drive, so the
//! recorded topology and the live signal path cannot diverge. Nothing is ever unbound.

use std::collections::BTreeMap;

use tracing::debug;

use crate::common::RealizeError;
use crate::core::{HartArray, HartInput, Interruptible};
use crate::soc::irq::IrqLine;
use crate::soc::memmap::DeviceId;

/// Where an interrupt line terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSink {
    /// Numbered input of the interrupt controller.
    ControllerSource {
        /// Controller device.
        controller: DeviceId,
        /// Input slot (never 0).
        slot: u32,
    },
    /// Interrupt input of a hart.
    Hart {
        /// Hart index in the array.
        hart: usize,
        /// Input on that hart.
        input: HartInput,
    },
}

/// One edge of the interrupt topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqBinding {
    /// Device driving the line.
    pub source: DeviceId,
    /// Name of the output line on the source.
    pub line: &'static str,
    /// Where the line lands.
    pub sink: IrqSink,
}

#[derive(Debug)]
struct Controller {
    device: DeviceId,
    inputs: Vec<IrqLine>,
    owners: BTreeMap<u32, (DeviceId, &'static str)>,
}

impl Controller {
    fn capacity(&self) -> u32 {
        self.inputs.len() as u32
    }
}

/// Records and validates every interrupt binding of the machine.
#[derive(Debug, Default)]
pub struct InterruptFabric {
    controller: Option<Controller>,
    hart_owners: BTreeMap<(usize, HartInput), DeviceId>,
    bindings: Vec<IrqBinding>,
}

impl InterruptFabric {
    /// Creates a fabric with no controller and no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the interrupt controller and its input lines.
    ///
    /// `inputs[n]` is the line behind slot `n`; `inputs.len()` is the source capacity,
    /// including reserved slot 0.
    ///
    /// # Errors
    ///
    /// `RealizeError::ControllerAlreadyAttached` if a controller is already registered.
    pub fn attach_controller(
        &mut self,
        device: DeviceId,
        inputs: Vec<IrqLine>,
    ) -> Result<(), RealizeError> {
        if let Some(existing) = &self.controller {
            return Err(RealizeError::ControllerAlreadyAttached {
                existing: existing.device,
                device,
            });
        }
        debug!(controller = %device, sources = inputs.len(), "attached interrupt controller");
        self.controller = Some(Controller {
            device,
            inputs,
            owners: BTreeMap::new(),
        });
        Ok(())
    }

    /// Returns the attached controller, if any.
    pub fn controller(&self) -> Option<DeviceId> {
        self.controller.as_ref().map(|c| c.device)
    }

    /// Returns the controller's source capacity, including reserved slot 0.
    pub fn capacity(&self) -> Option<u32> {
        self.controller.as_ref().map(Controller::capacity)
    }

    /// Binds `source.line` to controller input `slot`.
    ///
    /// # Returns
    ///
    /// The controller input line the source must drive.
    ///
    /// # Errors
    ///
    /// * `RealizeError::NoController` before `attach_controller`.
    /// * `RealizeError::ReservedSlot` for slot 0.
    /// * `RealizeError::SlotOutOfRange` for a slot at or beyond the capacity.
    /// * `RealizeError::SlotInUse` if another line already drives the slot.
    pub fn connect(
        &mut self,
        source: DeviceId,
        line: &'static str,
        slot: u32,
    ) -> Result<IrqLine, RealizeError> {
        let controller = self.controller.as_mut().ok_or(RealizeError::NoController {
            device: source,
            line,
        })?;
        if slot == 0 {
            return Err(RealizeError::ReservedSlot {
                device: source,
                line,
            });
        }
        let capacity = controller.capacity();
        if slot >= capacity {
            return Err(RealizeError::SlotOutOfRange {
                device: source,
                line,
                slot,
                capacity,
            });
        }
        if let Some(&(owner, owner_line)) = controller.owners.get(&slot) {
            return Err(RealizeError::SlotInUse {
                device: source,
                line,
                slot,
                owner,
                owner_line,
            });
        }

        let _ = controller.owners.insert(slot, (source, line));
        let irq = controller.inputs[slot as usize].clone();
        let sink = IrqSink::ControllerSource {
            controller: controller.device,
            slot,
        };
        debug!(source = %source, line, slot, "bound interrupt source");
        self.bindings.push(IrqBinding { source, line, sink });
        Ok(irq)
    }

    /// Binds `source.line` to the lowest free controller slot.
    ///
    /// # Returns
    ///
    /// The assigned slot and the line the source must drive.
    ///
    /// # Errors
    ///
    /// `RealizeError::NoController` before `attach_controller`, and
    /// `RealizeError::ControllerFull` when every slot from 1 upward is taken.
    pub fn allocate(
        &mut self,
        source: DeviceId,
        line: &'static str,
    ) -> Result<(u32, IrqLine), RealizeError> {
        let controller = self.controller.as_ref().ok_or(RealizeError::NoController {
            device: source,
            line,
        })?;
        let capacity = controller.capacity();
        let slot = (1..capacity)
            .find(|slot| !controller.owners.contains_key(slot))
            .ok_or(RealizeError::ControllerFull {
                device: source,
                line,
                capacity,
            })?;
        let irq = self.connect(source, line, slot)?;
        Ok((slot, irq))
    }

    /// Binds `source.line` directly to `input` on hart `hart`.
    ///
    /// # Returns
    ///
    /// The hart input line the source must drive.
    ///
    /// # Errors
    ///
    /// * `RealizeError::HartsNotRealized` if the hart array has not been realized.
    /// * `RealizeError::NoSuchHart` for an index past the array.
    /// * `RealizeError::HartInputInUse` if the input already has a driver.
    pub fn connect_hart(
        &mut self,
        source: DeviceId,
        line: &'static str,
        harts: &HartArray,
        hart: usize,
        input: HartInput,
    ) -> Result<IrqLine, RealizeError> {
        if !harts.is_realized() {
            return Err(RealizeError::HartsNotRealized);
        }
        let target = harts.hart(hart).ok_or(RealizeError::NoSuchHart {
            device: source,
            line,
            hart,
            num_harts: harts.harts().len(),
        })?;
        if let Some(&owner) = self.hart_owners.get(&(hart, input)) {
            return Err(RealizeError::HartInputInUse {
                device: source,
                line,
                hart,
                input,
                owner,
            });
        }

        let _ = self.hart_owners.insert((hart, input), source);
        debug!(source = %source, line, hart, input = %input, "bound hart interrupt input");
        self.bindings.push(IrqBinding {
            source,
            line,
            sink: IrqSink::Hart { hart, input },
        });
        Ok(target.irq_line(input).clone())
    }

    /// Returns every binding in the order it was made.
    pub fn bindings(&self) -> &[IrqBinding] {
        &self.bindings
    }

    /// Returns the source driving controller input `slot`.
    pub fn slot_owner(&self, slot: u32) -> Option<(DeviceId, &'static str)> {
        self.controller
            .as_ref()
            .and_then(|c| c.owners.get(&slot).copied())
    }

    /// Returns the device driving `input` on hart `hart`.
    pub fn hart_input_owner(&self, hart: usize, input: HartInput) -> Option<DeviceId> {
        self.hart_owners.get(&(hart, input)).copied()
    }
}
