//! SiFive UART Tests.
//!
//! Transmit path, receive FIFO, watermark interrupts, and the interrupt line.

use pretty_assertions::assert_eq;

use oscibear_core::soc::IrqLine;
use oscibear_core::soc::devices::{Console, Device, Uart};
use oscibear_core::soc::devices::uart::RX_FIFO_DEPTH;

const TXDATA: u64 = 0x00;
const RXDATA: u64 = 0x04;
const TXCTRL: u64 = 0x08;
const RXCTRL: u64 = 0x0C;
const IE: u64 = 0x10;
const IP: u64 = 0x14;
const DIV: u64 = 0x18;

fn uart() -> (Uart, IrqLine, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
    let (console, out) = Console::capture();
    let irq = IrqLine::new();
    let uart = Uart::new("uart0", 0x5400_0000, 0x1000, console, Some(irq.clone()));
    (uart, irq, out)
}

// ══════════════════════════════════════════════════════════
// 1. Transmit
// ══════════════════════════════════════════════════════════

#[test]
fn transmit_flushes_on_newline() {
    let (mut uart, _, out) = uart();
    for &b in b"hi" {
        uart.write_u32(TXDATA, u32::from(b));
    }
    assert!(out.lock().unwrap().is_empty(), "buffered until newline");
    uart.write_u32(TXDATA, u32::from(b'\n'));
    assert_eq!(out.lock().unwrap().as_slice(), b"hi\n");
}

#[test]
fn explicit_flush_emits_partial_line() {
    let (mut uart, _, out) = uart();
    uart.write_u8(TXDATA, b'>');
    uart.flush();
    assert_eq!(out.lock().unwrap().as_slice(), b">");
}

#[test]
fn txdata_reads_as_not_full() {
    let (mut uart, _, _) = uart();
    assert_eq!(uart.read_u32(TXDATA), 0);
}

// ══════════════════════════════════════════════════════════
// 2. Receive
// ══════════════════════════════════════════════════════════

#[test]
fn empty_fifo_sets_empty_flag() {
    let (mut uart, _, _) = uart();
    assert_eq!(uart.read_u32(RXDATA), 1 << 31);
}

#[test]
fn fifo_preserves_order() {
    let (mut uart, _, _) = uart();
    assert!(uart.push_rx(b'a'));
    assert!(uart.push_rx(b'b'));
    assert_eq!(uart.rx_len(), 2);
    assert_eq!(uart.read_u32(RXDATA), u32::from(b'a'));
    assert_eq!(uart.read_u32(RXDATA), u32::from(b'b'));
    assert_eq!(uart.read_u32(RXDATA), 1 << 31);
}

#[test]
fn fifo_rejects_overflow() {
    let (mut uart, _, _) = uart();
    for i in 0..RX_FIFO_DEPTH {
        assert!(uart.push_rx(i as u8));
    }
    assert!(!uart.push_rx(0xFF));
    assert_eq!(uart.rx_len(), RX_FIFO_DEPTH);
}

// ══════════════════════════════════════════════════════════
// 3. Control registers and interrupts
// ══════════════════════════════════════════════════════════

#[test]
fn control_registers_mask_reserved_bits() {
    let (mut uart, _, _) = uart();
    uart.write_u32(TXCTRL, 0xFFFF_FFFF);
    uart.write_u32(RXCTRL, 0xFFFF_FFFF);
    uart.write_u32(DIV, 0xFFFF_FFFF);
    assert_eq!(uart.read_u32(TXCTRL), 0x0007_0003);
    assert_eq!(uart.read_u32(RXCTRL), 0x0007_0001);
    assert_eq!(uart.read_u32(DIV), 0xFFFF);
}

#[test]
fn rx_watermark_raises_irq_when_enabled() {
    let (mut uart, irq, _) = uart();
    assert!(uart.push_rx(b'x'));
    assert_eq!(uart.read_u32(IP), 1 << 1, "rxcnt 0: one byte exceeds the watermark");
    assert!(!irq.is_raised(), "not enabled yet");

    uart.write_u32(IE, 1 << 1);
    assert!(irq.is_raised());
    assert!(uart.irq_asserted());

    let _ = uart.read_u32(RXDATA);
    assert!(!irq.is_raised(), "draining the FIFO clears the watermark");
}

#[test]
fn tx_watermark_pending_when_count_nonzero() {
    let (mut uart, irq, _) = uart();
    assert_eq!(uart.read_u32(IP) & 1, 0);
    uart.write_u32(TXCTRL, 1 << 16);
    uart.write_u32(IE, 1);
    assert_eq!(uart.read_u32(IP) & 1, 1);
    assert!(irq.is_raised());
}

#[test]
fn null_console_discards_output() {
    let mut uart = Uart::new("uart0", 0, 0x1000, Console::Null, None);
    uart.write_u32(TXDATA, u32::from(b'\n'));
    assert_eq!(uart.name(), "uart0");
    assert_eq!(uart.address_range(), (0, 0x1000));
}
