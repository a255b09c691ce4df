//! SiFive Universal Asynchronous Receiver-Transmitter (UART).
//!
//! Implements the SiFive UART register block for serial communication. Handles the
//! transmit/receive data, control, interrupt-enable, interrupt-pending, and divisor
//! registers, and integrates with a `Console` backend for host I/O.
//!
//! # Memory Map
//!
//! * `0x00`: TXDATA (bit 31: full)
//! * `0x04`: RXDATA (bit 31: empty)
//! * `0x08`: TXCTRL (bit 0: txen, bits 16..18: txcnt)
//! * `0x0C`: RXCTRL (bit 0: rxen, bits 16..18: rxcnt)
//! * `0x10`: IE
//! * `0x14`: IP (bit 0: txwm, bit 1: rxwm)
//! * `0x18`: DIV

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::config::SerialBackend;
use crate::soc::devices::Device;
use crate::soc::irq::IrqLine;

/// Transmit data register.
const REG_TXDATA: u64 = 0x00;
/// Receive data register.
const REG_RXDATA: u64 = 0x04;
/// Transmit control register.
const REG_TXCTRL: u64 = 0x08;
/// Receive control register.
const REG_RXCTRL: u64 = 0x0C;
/// Interrupt enable register.
const REG_IE: u64 = 0x10;
/// Interrupt pending register.
const REG_IP: u64 = 0x14;
/// Baud rate divisor register.
const REG_DIV: u64 = 0x18;

/// RXDATA: no byte available.
const RXDATA_EMPTY: u32 = 1 << 31;

/// IE/IP: transmit watermark.
const IP_TXWM: u32 = 1 << 0;
/// IE/IP: receive watermark.
const IP_RXWM: u32 = 1 << 1;

/// Writable bits of TXCTRL (txen, nstop, txcnt).
const TXCTRL_MASK: u32 = 0x0007_0003;
/// Writable bits of RXCTRL (rxen, rxcnt).
const RXCTRL_MASK: u32 = 0x0007_0001;

/// Depth of the receive FIFO.
pub const RX_FIFO_DEPTH: usize = 8;

/// Threshold for flushing transmit buffer to the host (4 KiB).
const TX_BUFFER_FLUSH_THRESHOLD: usize = 4096;

/// Host side of the serial port.
#[derive(Clone, Default)]
pub enum Console {
    /// Transmit to stdout, receive from stdin.
    #[default]
    Stdout,
    /// Transmit to stderr, receive from stdin.
    Stderr,
    /// Discard output, never receive.
    Null,
    /// Append output to a shared buffer, never receive from the host.
    Capture(Arc<Mutex<Vec<u8>>>),
}

impl Console {
    /// Creates a capturing console and returns it with its buffer.
    pub fn capture() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (Self::Capture(Arc::clone(&buffer)), buffer)
    }

    const fn reads_stdin(&self) -> bool {
        matches!(self, Self::Stdout | Self::Stderr)
    }

    fn emit(&self, bytes: &[u8]) {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(bytes);
                let _ = out.flush();
            }
            Self::Stderr => {
                let mut out = io::stderr().lock();
                let _ = out.write_all(bytes);
                let _ = out.flush();
            }
            Self::Null => {}
            Self::Capture(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend_from_slice(bytes);
                }
            }
        }
    }
}

impl From<SerialBackend> for Console {
    fn from(backend: SerialBackend) -> Self {
        match backend {
            SerialBackend::Stdio => Self::Stdout,
            SerialBackend::Stderr => Self::Stderr,
            SerialBackend::Null => Self::Null,
        }
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "Stdout",
            Self::Stderr => "Stderr",
            Self::Null => "Null",
            Self::Capture(_) => "Capture",
        })
    }
}

/// Returns the receiving end of the process-wide `stdin` reader, starting it on first use.
///
/// The reader thread lives for the rest of the process and is never joined. Every
/// host-backed UART polls the same channel, so constructing more machines adds no threads.
fn host_stdin() -> &'static Mutex<Receiver<u8>> {
    static STDIN: OnceLock<Mutex<Receiver<u8>>> = OnceLock::new();
    STDIN.get_or_init(|| {
        let (tx, rx) = channel();
        let _ = thread::spawn(move || {
            let mut buffer = [0u8; 1];
            let stdin = io::stdin();
            let mut handle = stdin.lock();
            while handle.read_exact(&mut buffer).is_ok() {
                if tx.send(buffer[0]).is_err() {
                    break;
                }
            }
        });
        Mutex::new(rx)
    })
}

/// UART device structure.
///
/// Host-backed consoles receive from a single shared `stdin` reader thread; received
/// bytes enter the FIFO as space allows.
pub struct Uart {
    /// Region name.
    name: String,
    /// Base physical address of the device.
    base_addr: u64,
    /// Size of the register window.
    size: u64,
    /// Receive FIFO.
    rx_fifo: VecDeque<u8>,
    /// Shared stdin channel, for host-backed consoles.
    rx_receiver: Option<&'static Mutex<Receiver<u8>>>,
    txctrl: u32,
    rxctrl: u32,
    ie: u32,
    div: u32,
    /// Internal tick counter for polling stdin.
    tick_count: u8,
    /// Buffer for outgoing bytes.
    tx_buffer: Vec<u8>,
    console: Console,
    /// Interrupt output (`ie & ip`), if wired.
    irq: Option<IrqLine>,
}

impl Uart {
    /// Creates a new UART device.
    ///
    /// A host-backed console starts the shared stdin reader if it is not yet running.
    ///
    /// # Arguments
    ///
    /// * `name` - Region name in the address space.
    /// * `base_addr` - The base physical address of the UART device.
    /// * `size` - Size of the register window.
    /// * `console` - Host side of the port.
    /// * `irq` - Interrupt output line, if wired.
    pub fn new(
        name: impl Into<String>,
        base_addr: u64,
        size: u64,
        console: Console,
        irq: Option<IrqLine>,
    ) -> Self {
        let rx_receiver = console.reads_stdin().then(host_stdin);

        Self {
            name: name.into(),
            base_addr,
            size,
            rx_fifo: VecDeque::with_capacity(RX_FIFO_DEPTH),
            rx_receiver,
            txctrl: 0,
            rxctrl: 0,
            ie: 0,
            div: 0,
            tick_count: 0,
            tx_buffer: Vec::new(),
            console,
            irq,
        }
    }

    /// Queues a received byte; returns `false` if the FIFO is full.
    pub fn push_rx(&mut self, byte: u8) -> bool {
        if self.rx_fifo.len() >= RX_FIFO_DEPTH {
            return false;
        }
        self.rx_fifo.push_back(byte);
        self.update_irq();
        true
    }

    /// Returns the number of bytes waiting in the receive FIFO.
    pub fn rx_len(&self) -> usize {
        self.rx_fifo.len()
    }

    /// Returns the interrupt-pending bits.
    pub fn pending(&self) -> u32 {
        let mut ip = 0;
        // The transmit FIFO always drains immediately.
        if (self.txctrl >> 16) & 0x7 != 0 {
            ip |= IP_TXWM;
        }
        if self.rx_fifo.len() > ((self.rxctrl >> 16) & 0x7) as usize {
            ip |= IP_RXWM;
        }
        ip
    }

    /// Returns whether the interrupt output is asserted.
    pub fn irq_asserted(&self) -> bool {
        self.ie & self.pending() != 0
    }

    fn update_irq(&self) {
        if let Some(irq) = &self.irq {
            irq.set_level(self.irq_asserted());
        }
    }

    /// Moves bytes from the stdin thread into the FIFO while there is room.
    fn check_stdin(&mut self) {
        let Some(receiver) = self.rx_receiver else {
            return;
        };
        let Ok(rx) = receiver.lock() else {
            return;
        };
        while self.rx_fifo.len() < RX_FIFO_DEPTH {
            match rx.try_recv() {
                Ok(byte) => self.rx_fifo.push_back(byte),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Flushes the transmit buffer to the console.
    fn flush_buffer(&mut self) {
        if !self.tx_buffer.is_empty() {
            self.console.emit(&self.tx_buffer);
            self.tx_buffer.clear();
        }
    }

    fn transmit(&mut self, byte: u8) {
        self.tx_buffer.push(byte);
        if byte == b'\n' || self.tx_buffer.len() >= TX_BUFFER_FLUSH_THRESHOLD {
            self.flush_buffer();
        }
    }

    /// Flushes any buffered output.
    pub fn flush(&mut self) {
        self.flush_buffer();
    }
}

impl Drop for Uart {
    /// Flushes any remaining output when the UART is dropped.
    fn drop(&mut self) {
        self.flush_buffer();
    }
}

impl Device for Uart {
    /// Returns the device name.
    fn name(&self) -> &str {
        &self.name
    }
    /// Returns the address range (Base, Size).
    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.size)
    }

    /// Reads a byte (delegates to read_u32).
    fn read_u8(&mut self, offset: u64) -> u8 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u8
    }
    /// Reads a half-word (delegates to read_u32).
    fn read_u16(&mut self, offset: u64) -> u16 {
        (self.read_u32(offset & !3) >> ((offset & 3) * 8)) as u16
    }

    /// Reads a word from the device.
    fn read_u32(&mut self, offset: u64) -> u32 {
        match offset {
            REG_TXDATA => 0,
            REG_RXDATA => {
                let val = self
                    .rx_fifo
                    .pop_front()
                    .map_or(RXDATA_EMPTY, u32::from);
                self.update_irq();
                val
            }
            REG_TXCTRL => self.txctrl,
            REG_RXCTRL => self.rxctrl,
            REG_IE => self.ie,
            REG_IP => self.pending(),
            REG_DIV => self.div,
            _ => 0,
        }
    }

    /// Reads a double-word (delegates to read_u32).
    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from(self.read_u32(offset))
    }

    /// Writes a byte; a byte written to TXDATA is transmitted.
    fn write_u8(&mut self, offset: u64, val: u8) {
        if offset & 3 == 0 {
            self.write_u32(offset, u32::from(val));
        }
    }
    /// Writes a half-word (delegates to write_u32).
    fn write_u16(&mut self, offset: u64, val: u16) {
        if offset & 3 == 0 {
            self.write_u32(offset, u32::from(val));
        }
    }

    /// Writes a word to the device.
    fn write_u32(&mut self, offset: u64, val: u32) {
        match offset {
            REG_TXDATA => self.transmit(val as u8),
            REG_TXCTRL => self.txctrl = val & TXCTRL_MASK,
            REG_RXCTRL => self.rxctrl = val & RXCTRL_MASK,
            REG_IE => self.ie = val & (IP_TXWM | IP_RXWM),
            REG_DIV => self.div = val & 0xFFFF,
            _ => return,
        }
        self.update_irq();
    }

    /// Writes a double-word (delegates to write_u32).
    fn write_u64(&mut self, offset: u64, val: u64) {
        self.write_u32(offset, val as u32);
    }

    /// Advances the device state.
    ///
    /// Polls stdin periodically and refreshes the interrupt output.
    fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.tick_count == 0 {
            self.check_stdin();
        }
        self.update_irq();
    }

    /// Returns a mutable reference to the UART if this device is one.
    fn as_uart_mut(&mut self) -> Option<&mut Uart> {
        Some(self)
    }
}
