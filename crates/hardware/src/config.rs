//! Configuration for the OsciBear machine.
//!
//! This module defines the machine-level inputs consumed before composition begins. It provides:
//! 1. **Defaults:** Baseline values (one hart, `rv64` core, RAM sized to the DTIM window).
//! 2. **Structures:** `general` (cores, boot image), `memory` (RAM size), and `system` (serial, timer).
//! 3. **Enums:** CPU core types and serial backends, parseable from strings.
//!
//! Configuration is supplied as JSON (`Config::from_json`/`Config::from_file`) or built from
//! `Config::default()` and command-line overrides. It is immutable once composition starts.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the machine.
mod defaults {
    /// Number of harts (the topology maximum).
    pub const NUM_HARTS: usize = 1;

    /// Size of main RAM; matches the DTIM window of the memory map.
    pub const RAM_SIZE: u64 = 0x8000_8000;

    /// Simulation ticks per `mtime` increment.
    pub const CLINT_DIVIDER: u64 = 10;

    /// Advertised timer frequency (10 MHz).
    pub const TIMEBASE_FREQ: u64 = 10_000_000;
}

/// Architectural type of the harts in the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum CpuType {
    /// Generic RV32 core.
    #[serde(rename = "rv32")]
    Rv32,
    /// Generic RV64 core.
    #[default]
    #[serde(rename = "rv64")]
    Rv64,
    /// SiFive E31 (RV32IMAC).
    #[serde(rename = "sifive-e31")]
    SifiveE31,
    /// SiFive E34 (RV32IMAFC).
    #[serde(rename = "sifive-e34")]
    SifiveE34,
    /// SiFive E51 (RV64IMAC).
    #[serde(rename = "sifive-e51")]
    SifiveE51,
    /// SiFive U34 (RV32GC).
    #[serde(rename = "sifive-u34")]
    SifiveU34,
    /// SiFive U54 (RV64GC).
    #[serde(rename = "sifive-u54")]
    SifiveU54,
}

impl CpuType {
    /// Every supported core type.
    pub const ALL: [Self; 7] = [
        Self::Rv32,
        Self::Rv64,
        Self::SifiveE31,
        Self::SifiveE34,
        Self::SifiveE51,
        Self::SifiveU34,
        Self::SifiveU54,
    ];

    /// Returns the canonical name of the core type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rv32 => "rv32",
            Self::Rv64 => "rv64",
            Self::SifiveE31 => "sifive-e31",
            Self::SifiveE34 => "sifive-e34",
            Self::SifiveE51 => "sifive-e51",
            Self::SifiveU34 => "sifive-u34",
            Self::SifiveU54 => "sifive-u54",
        }
    }

    /// Returns the native register width in bits (32 or 64).
    pub const fn xlen(self) -> u32 {
        match self {
            Self::Rv32 | Self::SifiveE31 | Self::SifiveE34 | Self::SifiveU34 => 32,
            Self::Rv64 | Self::SifiveE51 | Self::SifiveU54 => 64,
        }
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownCpuType(s.to_string()))
    }
}

/// Where the UART's transmit side is written and its receive side is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialBackend {
    /// Transmit to stdout, receive from stdin.
    #[default]
    Stdio,
    /// Transmit to stderr, receive from stdin.
    Stderr,
    /// Discard output, never receive.
    Null,
}

impl FromStr for SerialBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "stderr" => Ok(Self::Stderr),
            "null" | "none" => Ok(Self::Null),
            _ => Err(ConfigError::UnknownSerialBackend(s.to_string())),
        }
    }
}

/// Root configuration: general, memory, and system sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Cores and boot image.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Main RAM.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Serial backend and timer parameters.
    #[serde(default)]
    pub system: SystemConfig,
}

impl Config {
    /// Parses a configuration from JSON text; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::from_json(&text)
    }
}

/// Core selection and boot image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneralConfig {
    /// Architectural type shared by every hart.
    #[serde(default)]
    pub cpu_type: CpuType,
    /// Number of harts to create.
    #[serde(default = "GeneralConfig::default_num_harts")]
    pub num_harts: usize,
    /// Boot image (ELF or raw binary) loaded at the RAM base.
    #[serde(default)]
    pub kernel: Option<PathBuf>,
}

impl GeneralConfig {
    const fn default_num_harts() -> usize {
        defaults::NUM_HARTS
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cpu_type: CpuType::default(),
            num_harts: defaults::NUM_HARTS,
            kernel: None,
        }
    }
}

/// Main RAM parameters. The RAM's placement comes from the memory map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryConfig {
    /// RAM size in bytes.
    #[serde(default = "MemoryConfig::default_ram_size")]
    pub ram_size: u64,
}

impl MemoryConfig {
    const fn default_ram_size() -> u64 {
        defaults::RAM_SIZE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: defaults::RAM_SIZE,
        }
    }
}

/// Serial console and timer parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemConfig {
    /// UART console backend.
    #[serde(default)]
    pub serial: SerialBackend,
    /// Simulation ticks per `mtime` increment.
    #[serde(default = "SystemConfig::default_clint_divider")]
    pub clint_divider: u64,
    /// Advertised `mtime` frequency in Hz.
    #[serde(default = "SystemConfig::default_timebase_freq")]
    pub timebase_freq: u64,
}

impl SystemConfig {
    const fn default_clint_divider() -> u64 {
        defaults::CLINT_DIVIDER
    }

    const fn default_timebase_freq() -> u64 {
        defaults::TIMEBASE_FREQ
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            serial: SerialBackend::default(),
            clint_divider: defaults::CLINT_DIVIDER,
            timebase_freq: defaults::TIMEBASE_FREQ,
        }
    }
}
