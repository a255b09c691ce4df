//! Device registry.
//!
//! An explicit catalog of constructible devices handed to the composer at startup. Each
//! `DeviceId` maps to a one-shot factory: `create` consumes it, so a device is built at
//! most once per machine. Factories receive a `RealizeContext` carrying their memory-map
//! entry, the realized harts, and the interrupt fabric to register their lines with.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::common::{ConfigError, RealizeError};
use crate::config::SystemConfig;
use crate::core::HartArray;
use crate::soc::fabric::InterruptFabric;
use crate::soc::memmap::{DeviceId, MemMapEntry};
use crate::soc::traits::Device;

/// Everything a factory may consult while building its device.
pub struct RealizeContext<'a> {
    /// Memory-map entry of the device being created.
    pub entry: MemMapEntry,
    /// The realized hart array.
    pub harts: &'a HartArray,
    /// Interrupt fabric to bind output lines through.
    pub fabric: &'a mut InterruptFabric,
    /// System-level parameters (serial backend, timer divider).
    pub system: &'a SystemConfig,
}

/// Builds the bus devices for one `DeviceId`.
///
/// A factory may return several devices (the CLINT window holds both ACLINT blocks);
/// each must lie inside `ctx.entry`.
pub type DeviceFactory =
    Box<dyn FnOnce(&mut RealizeContext<'_>) -> Result<Vec<Box<dyn Device>>, RealizeError>>;

/// Maps device identifiers to their factories.
#[derive(Default)]
pub struct DeviceRegistry {
    factories: BTreeMap<DeviceId, DeviceFactory>,
    created: BTreeSet<DeviceId>,
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("registered", &self.factories.keys().collect::<Vec<_>>())
            .field("created", &self.created)
            .finish()
    }
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `id`.
    ///
    /// # Errors
    ///
    /// `ConfigError::DuplicateFactory` if `id` already has one.
    pub fn register<F>(&mut self, id: DeviceId, factory: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut RealizeContext<'_>) -> Result<Vec<Box<dyn Device>>, RealizeError>
            + 'static,
    {
        if self.factories.contains_key(&id) || self.created.contains(&id) {
            return Err(ConfigError::DuplicateFactory(id));
        }
        let _ = self.factories.insert(id, Box::new(factory));
        Ok(())
    }

    /// Registers or overrides the factory for `id`; returns whether one was replaced.
    pub fn replace<F>(&mut self, id: DeviceId, factory: F) -> bool
    where
        F: FnOnce(&mut RealizeContext<'_>) -> Result<Vec<Box<dyn Device>>, RealizeError>
            + 'static,
    {
        self.factories.insert(id, Box::new(factory)).is_some()
    }

    /// Returns whether a factory for `id` is waiting to run.
    pub fn contains(&self, id: DeviceId) -> bool {
        self.factories.contains_key(&id)
    }

    /// Returns whether `id` has already been created.
    pub fn is_created(&self, id: DeviceId) -> bool {
        self.created.contains(&id)
    }

    /// Runs and consumes the factory for `id`.
    ///
    /// # Errors
    ///
    /// `RealizeError::AlreadyCreated` on a second call for the same id,
    /// `RealizeError::MissingFactory` if none was registered, or whatever the factory
    /// returns.
    pub fn create(
        &mut self,
        id: DeviceId,
        ctx: &mut RealizeContext<'_>,
    ) -> Result<Vec<Box<dyn Device>>, RealizeError> {
        if self.created.contains(&id) {
            return Err(RealizeError::AlreadyCreated(id));
        }
        let factory = self
            .factories
            .remove(&id)
            .ok_or(RealizeError::MissingFactory(id))?;
        let _ = self.created.insert(id);
        factory(ctx)
    }
}
