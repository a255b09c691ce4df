//! OsciBear board description.
//!
//! Topology constants and the default device registry. It provides:
//! 1. **Limits:** Hart count, interrupt numbers, and ACLINT sub-block layout.
//! 2. **Creation phases:** Which devices the composer realizes at each state.
//! 3. **Factories:** How each mapped block is built and wired.
//!
//! Every address comes from the `RealizeContext` entry; nothing here hardcodes a base.

use crate::common::RealizeError;
use crate::core::HartInput;
use crate::soc::devices::{
    AclintMtimer, AclintSwi, Console, Device, MtimerConfig, Plic, PlicConfig, Rom, Uart,
    Unimplemented,
};
use crate::soc::memmap::{DeviceId, MemMapEntry};
use crate::soc::memory::Memory;
use crate::soc::registry::{DeviceRegistry, RealizeContext};

/// Largest number of harts this topology supports.
pub const MAX_HARTS: usize = 1;

/// PLIC contexts per hart.
pub const PLIC_HART_CONFIG: &str = "M";

/// PLIC source driven by UART0.
pub const UART0_IRQ: u32 = 3;

/// Size of the ACLINT software-interrupt block at the CLINT base.
pub const ACLINT_SWI_SIZE: u64 = 0x4000;
/// Size of the ACLINT machine-timer block that follows it.
pub const ACLINT_MTIMER_SIZE: u64 = 0x8000;
/// Offset of `mtimecmp[0]` inside the timer block.
pub const ACLINT_MTIMECMP_BASE: u64 = 0x0;
/// Offset of `mtime` inside the timer block.
pub const ACLINT_MTIME_BASE: u64 = 0x7ff8;

/// Fill byte of the boot ROM.
pub const BOOT_ROM_FILL: u8 = 0x00;
/// Fill byte of the flash window (erased NOR).
pub const QSPI_XIP_FILL: u8 = 0xFF;

/// The region that holds main RAM and the reset vector.
pub const MAIN_RAM: DeviceId = DeviceId::Dtim;

/// Realized once the hart array exists.
pub const INTERRUPT_CONTROLLERS: [DeviceId; 1] = [DeviceId::Plic];

/// Realized once the interrupt controller exists.
pub const PERIPHERALS: [DeviceId; 2] = [DeviceId::Uart0, DeviceId::Clint];

/// Realized last; main RAM is installed separately by the bootstrap.
pub const MEMORY_REGIONS: [DeviceId; 8] = [
    DeviceId::BootRom,
    DeviceId::LbwifRam,
    DeviceId::QspiXip,
    DeviceId::Debug,
    DeviceId::SystemControl,
    DeviceId::Error,
    DeviceId::TileResetControl,
    DeviceId::QspiControl,
];

type Devices = Result<Vec<Box<dyn Device>>, RealizeError>;

/// Builds the registry of every OsciBear device except main RAM.
///
/// # Arguments
///
/// * `console` - Host side of UART0.
pub fn registry(console: Console) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    let _ = registry.replace(DeviceId::Plic, create_plic);
    let _ = registry.replace(DeviceId::Uart0, move |ctx: &mut RealizeContext<'_>| {
        create_uart(ctx, console)
    });
    let _ = registry.replace(DeviceId::Clint, create_aclint);
    let _ = registry.replace(DeviceId::BootRom, |ctx: &mut RealizeContext<'_>| {
        create_rom(ctx, BOOT_ROM_FILL)
    });
    let _ = registry.replace(DeviceId::QspiXip, |ctx: &mut RealizeContext<'_>| {
        create_rom(ctx, QSPI_XIP_FILL)
    });
    let _ = registry.replace(DeviceId::LbwifRam, create_ram_window);
    for id in [
        DeviceId::Debug,
        DeviceId::SystemControl,
        DeviceId::Error,
        DeviceId::TileResetControl,
        DeviceId::QspiControl,
    ] {
        let _ = registry.replace(id, create_unimplemented);
    }
    registry
}

fn window_len(entry: &MemMapEntry) -> Result<usize, RealizeError> {
    usize::try_from(entry.size).map_err(|_| RealizeError::InvalidParameter {
        device: entry.device,
        reason: format!("window of {:#x} bytes does not fit the host", entry.size),
    })
}

/// PLIC with one context per hart mode, each wired to the hart's external input.
fn create_plic(ctx: &mut RealizeContext<'_>) -> Devices {
    let config = PlicConfig::sifive_e(ctx.harts.num_harts(), PLIC_HART_CONFIG, ctx.entry.size)?;
    config.validate()?;

    let mut outputs = Vec::with_capacity(config.num_contexts());
    for hart in 0..config.num_harts {
        for mode in &config.hart_modes {
            outputs.push(ctx.fabric.connect_hart(
                DeviceId::Plic,
                mode.line_name(),
                ctx.harts,
                hart,
                mode.hart_input(),
            )?);
        }
    }

    let plic = Plic::new(ctx.entry.base, config, outputs)?;
    ctx.fabric.attach_controller(DeviceId::Plic, plic.source_lines())?;
    let devices: Vec<Box<dyn Device>> = vec![Box::new(plic)];
    Ok(devices)
}

fn create_uart(ctx: &mut RealizeContext<'_>, console: Console) -> Devices {
    let irq = ctx.fabric.connect(DeviceId::Uart0, "irq", UART0_IRQ)?;
    let uart = Uart::new(
        ctx.entry.device.name(),
        ctx.entry.base,
        ctx.entry.size,
        console,
        Some(irq),
    );
    let devices: Vec<Box<dyn Device>> = vec![Box::new(uart)];
    Ok(devices)
}

/// SWI at the CLINT base and MTIMER right after it; both bypass the PLIC.
fn create_aclint(ctx: &mut RealizeContext<'_>) -> Devices {
    if ACLINT_SWI_SIZE + ACLINT_MTIMER_SIZE > ctx.entry.size {
        return Err(RealizeError::InvalidParameter {
            device: DeviceId::Clint,
            reason: format!(
                "ACLINT blocks need {:#x} bytes, window is {:#x}",
                ACLINT_SWI_SIZE + ACLINT_MTIMER_SIZE,
                ctx.entry.size
            ),
        });
    }
    let num_harts = ctx.harts.num_harts();

    let mut msip = Vec::with_capacity(num_harts);
    let mut mtip = Vec::with_capacity(num_harts);
    for hart in 0..num_harts {
        msip.push(ctx.fabric.connect_hart(
            DeviceId::Clint,
            "msip",
            ctx.harts,
            hart,
            HartInput::MachineSoftware,
        )?);
        mtip.push(ctx.fabric.connect_hart(
            DeviceId::Clint,
            "mtip",
            ctx.harts,
            hart,
            HartInput::MachineTimer,
        )?);
    }

    let swi = AclintSwi::new(ctx.entry.base, ACLINT_SWI_SIZE, msip)?;
    let mtimer = AclintMtimer::new(
        ctx.entry.base + ACLINT_SWI_SIZE,
        MtimerConfig {
            num_harts,
            aperture_size: ACLINT_MTIMER_SIZE,
            timecmp_base: ACLINT_MTIMECMP_BASE,
            time_base: ACLINT_MTIME_BASE,
            divider: ctx.system.clint_divider,
            timebase_freq: ctx.system.timebase_freq,
        },
        mtip,
    )?;
    let devices: Vec<Box<dyn Device>> = vec![Box::new(swi), Box::new(mtimer)];
    Ok(devices)
}

fn create_rom(ctx: &mut RealizeContext<'_>, fill: u8) -> Devices {
    let len = window_len(&ctx.entry)?;
    let rom = Rom::new(ctx.entry.device.name(), ctx.entry.base, len, fill);
    let devices: Vec<Box<dyn Device>> = vec![Box::new(rom)];
    Ok(devices)
}

fn create_ram_window(ctx: &mut RealizeContext<'_>) -> Devices {
    let ram = Memory::allocate(ctx.entry.device.name(), ctx.entry.base, ctx.entry.size)?;
    let devices: Vec<Box<dyn Device>> = vec![Box::new(ram)];
    Ok(devices)
}

fn create_unimplemented(ctx: &mut RealizeContext<'_>) -> Devices {
    let block = Unimplemented::new(ctx.entry.device.name(), ctx.entry.base, ctx.entry.size);
    let devices: Vec<Box<dyn Device>> = vec![Box::new(block)];
    Ok(devices)
}
