//! OsciBear SoC command-line front end.
//!
//! This binary composes the machine and reports what was built. It provides:
//! 1. **Run:** Compose the machine, load an optional boot image, and advance the devices.
//! 2. **Layout:** Print the composed address space and interrupt wiring (text or JSON).
//!
//! Configuration starts from built-in defaults or a JSON file; flags override individual fields.

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oscibear_core::common::ConfigError;
use oscibear_core::config::{Config, CpuType, SerialBackend};
use oscibear_core::core::Runnable;
use oscibear_core::soc::IrqSink;
use oscibear_core::Machine;

#[derive(Parser, Debug)]
#[command(
    name = "oscibear",
    author,
    version,
    about = "EE290C OsciBear RISC-V SoC model",
    long_about = "Compose the OsciBear machine, load a boot image, and inspect the result.\n\nExamples:\n  oscibear run --kernel firmware.elf\n  oscibear layout --json\n  oscibear run --config board.json --ticks 100000"
)]
struct Cli {
    /// Log filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose the machine and advance its devices.
    Run {
        #[command(flatten)]
        machine: MachineArgs,

        /// Device ticks to run after bootstrap.
        #[arg(long, default_value_t = 0)]
        ticks: u64,
    },

    /// Compose the machine and print its address space and interrupt wiring.
    Layout {
        #[command(flatten)]
        machine: MachineArgs,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct MachineArgs {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boot image (ELF or raw binary).
    #[arg(short, long)]
    kernel: Option<PathBuf>,

    /// Number of harts.
    #[arg(long)]
    smp: Option<usize>,

    /// CPU type (rv32, rv64, sifive-e31, ...).
    #[arg(long)]
    cpu: Option<String>,

    /// RAM size in bytes (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_size)]
    ram_size: Option<u64>,

    /// Serial backend (stdio, stderr, null).
    #[arg(long)]
    serial: Option<String>,
}

impl MachineArgs {
    /// Loads the base configuration and applies the flag overrides.
    fn resolve(self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(kernel) = self.kernel {
            config.general.kernel = Some(kernel);
        }
        if let Some(n) = self.smp {
            config.general.num_harts = n;
        }
        if let Some(cpu) = &self.cpu {
            config.general.cpu_type = cpu.parse::<CpuType>()?;
        }
        if let Some(size) = self.ram_size {
            config.memory.ram_size = size;
        }
        if let Some(serial) = &self.serial {
            config.system.serial = serial.parse::<SerialBackend>()?;
        }
        Ok(config)
    }
}

fn parse_size(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid size `{s}`: {e}"))
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { machine, ticks } => cmd_run(machine, ticks),
        Commands::Layout { machine, json } => cmd_layout(machine, json),
    }
}

/// Joins `err` and its causes with `: `, skipping causes a wrapper already prints.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = inner.source();
    }
    message
}

/// Reports `err` with its cause chain and exits with status 1.
fn fatal(err: &dyn Error) -> ! {
    let message = error_chain(err);
    error!(error = %message, "fatal");
    eprintln!("[!] FATAL: {message}");
    process::exit(1);
}

/// Builds the machine or exits with status 1.
fn build(args: MachineArgs) -> Machine {
    let config = args.resolve().unwrap_or_else(|e| fatal(&e));
    Machine::new(config).unwrap_or_else(|e| fatal(&e))
}

fn cmd_run(args: MachineArgs, ticks: u64) {
    let mut machine = build(args);

    let config = machine.config();
    println!(
        "[*] OsciBear: {} x {}  RAM: {:#x} bytes at {:#x}",
        config.general.num_harts,
        config.general.cpu_type,
        machine.ram_region().size,
        machine.ram_region().base
    );
    match machine.boot_image() {
        Some(image) => println!(
            "[*] Boot image: {} entry={:#x} bytes={:#x}",
            image.format, image.entry, image.bytes_written
        ),
        None => println!("[*] No boot image"),
    }
    for hart in machine.harts().harts() {
        println!("    hart {} reset vector {:#x}", hart.hart_id(), hart.reset_vector());
    }

    if ticks > 0 {
        machine.run_for(ticks);
        info!(ticks, "device run finished");
        println!("[*] Ran {ticks} device ticks");
    }
    if let Some(uart) = machine.bus_mut().uart_mut("uart0") {
        uart.flush();
    }
}

fn cmd_layout(args: MachineArgs, json: bool) {
    let machine = build(args);
    let soc = machine.soc();

    if json {
        let regions: Vec<_> = machine
            .layout()
            .into_iter()
            .map(|r| serde_json::json!({ "name": r.name, "base": r.base, "size": r.size }))
            .collect();
        let bindings: Vec<_> = soc
            .fabric()
            .bindings()
            .iter()
            .map(|b| {
                let sink = match b.sink {
                    IrqSink::ControllerSource { controller, slot } => {
                        serde_json::json!({ "controller": controller.name(), "slot": slot })
                    }
                    IrqSink::Hart { hart, input } => {
                        serde_json::json!({ "hart": hart, "input": input.to_string() })
                    }
                };
                serde_json::json!({ "source": b.source.name(), "line": b.line, "sink": sink })
            })
            .collect();
        let doc = serde_json::json!({
            "state": soc.state().to_string(),
            "regions": regions,
            "interrupts": bindings,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(text) => println!("{text}"),
            Err(e) => fatal(&e),
        }
        return;
    }

    println!("Address space ({}):", soc.state());
    for region in machine.layout() {
        println!(
            "  {:#012x} - {:#012x}  {}",
            region.base,
            region.end(),
            region.name
        );
    }
    println!("Interrupts:");
    for binding in soc.fabric().bindings() {
        match binding.sink {
            IrqSink::ControllerSource { controller, slot } => println!(
                "  {}.{} -> {} source {}",
                binding.source, binding.line, controller, slot
            ),
            IrqSink::Hart { hart, input } => println!(
                "  {}.{} -> hart {} {}",
                binding.source, binding.line, hart, input
            ),
        }
    }
}
