//! PLIC Tests.
//!
//! Register layout, gateway behavior, priority arbitration, and the
//! claim/complete flow, all driven through source and context lines.

use pretty_assertions::assert_eq;
use rstest::rstest;

use oscibear_core::common::RealizeError;
use oscibear_core::soc::devices::{ContextMode, Device, Plic, PlicConfig};
use oscibear_core::soc::{DeviceId, IrqLine};

const PRIORITY: u64 = 0x0;
const PENDING: u64 = 0x1000;
const ENABLE: u64 = 0x2000;
const THRESHOLD: u64 = 0x20_0000;
const CLAIM: u64 = 0x20_0004;

struct Fixture {
    plic: Plic,
    meip: IrqLine,
    sources: Vec<IrqLine>,
}

fn fixture() -> Fixture {
    let meip = IrqLine::new();
    let plic = Plic::new(
        0xc00_0000,
        PlicConfig::sifive_e(1, "M", 0x400_0000).unwrap(),
        vec![meip.clone()],
    )
    .unwrap();
    let sources = plic.source_lines();
    Fixture {
        plic,
        meip,
        sources,
    }
}

fn priority(source: u64) -> u64 {
    PRIORITY + 4 * source
}

// ══════════════════════════════════════════════════════════
// 1. Configuration
// ══════════════════════════════════════════════════════════

#[test]
fn sifive_e_layout() {
    let config = PlicConfig::sifive_e(1, "M", 0x400_0000).unwrap();
    assert_eq!(config.num_sources, 53);
    assert_eq!(config.num_priorities, 7);
    assert_eq!(config.num_contexts(), 1);
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn output_count_must_match_contexts() {
    let config = PlicConfig::sifive_e(1, "M", 0x400_0000).unwrap();
    let err = Plic::new(0, config, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        RealizeError::InvalidParameter {
            device: DeviceId::Plic,
            ..
        }
    ));
}

#[test]
fn aperture_too_small_is_rejected() {
    let config = PlicConfig::sifive_e(1, "M", 0x1000).unwrap();
    assert!(config.validate().is_err());
}

#[rstest]
#[case("M", Some(vec![ContextMode::Machine]))]
#[case("MS", Some(vec![ContextMode::Machine, ContextMode::Supervisor]))]
#[case("", None)]
#[case("MX", None)]
fn hart_config_strings(#[case] text: &str, #[case] expected: Option<Vec<ContextMode>>) {
    assert_eq!(ContextMode::parse_hart_config(text), expected);
}

#[test]
fn sifive_e_with_supervisor_contexts() {
    let config = PlicConfig::sifive_e(2, "MS", 0x400_0000).unwrap();
    assert_eq!(config.num_contexts(), 4);
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn sifive_e_rejects_bad_hart_config() {
    let err = PlicConfig::sifive_e(1, "MX", 0x400_0000).unwrap_err();
    assert!(matches!(
        err,
        RealizeError::InvalidParameter {
            device: DeviceId::Plic,
            ..
        }
    ));
}

#[test]
fn source_lines_cover_every_source() {
    let f = fixture();
    assert_eq!(f.sources.len(), 53);
    assert_eq!(f.plic.address_range(), (0xc00_0000, 0x400_0000));
    assert_eq!(f.plic.name(), "plic");
}

// ══════════════════════════════════════════════════════════
// 2. Registers
// ══════════════════════════════════════════════════════════

#[test]
fn priority_registers_clamp_to_levels() {
    let mut f = fixture();
    f.plic.write_u32(priority(3), 7);
    assert_eq!(f.plic.read_u32(priority(3)), 7);
    f.plic.write_u32(priority(3), 8);
    assert_eq!(f.plic.read_u32(priority(3)), 7, "out-of-range priority is ignored");
    assert_eq!(f.plic.read_u32(PRIORITY), 0, "source 0 has no priority");
}

#[test]
fn source_zero_cannot_be_enabled() {
    let mut f = fixture();
    f.plic.write_u32(ENABLE, 0xFFFF_FFFF);
    assert_eq!(f.plic.read_u32(ENABLE), 0xFFFF_FFFE);
}

#[test]
fn pending_bits_are_read_only() {
    let mut f = fixture();
    f.plic.write_u32(PENDING, 0xFFFF_FFFF);
    assert_eq!(f.plic.read_u32(PENDING), 0);
}

#[test]
fn level_source_sets_pending() {
    let mut f = fixture();
    f.sources[3].raise();
    f.plic.tick();
    assert!(f.plic.is_pending(3));
    assert_eq!(f.plic.read_u32(PENDING), 1 << 3);

    f.sources[3].lower();
    f.plic.tick();
    assert!(!f.plic.is_pending(3));
}

// ══════════════════════════════════════════════════════════
// 3. Arbitration and claim/complete
// ══════════════════════════════════════════════════════════

#[test]
fn enabled_source_above_threshold_raises_meip() {
    let mut f = fixture();
    f.plic.write_u32(priority(3), 1);
    f.plic.write_u32(ENABLE, 1 << 3);
    f.sources[3].raise();
    f.plic.tick();
    assert!(f.meip.is_raised());
}

#[test]
fn priority_zero_never_interrupts() {
    let mut f = fixture();
    f.plic.write_u32(ENABLE, 1 << 3);
    f.sources[3].raise();
    f.plic.tick();
    assert!(f.plic.is_pending(3));
    assert!(!f.meip.is_raised());
    assert_eq!(f.plic.read_u32(CLAIM), 0);
}

#[test]
fn threshold_masks_lower_priorities() {
    let mut f = fixture();
    f.plic.write_u32(priority(3), 2);
    f.plic.write_u32(ENABLE, 1 << 3);
    f.plic.write_u32(THRESHOLD, 2);
    f.sources[3].raise();
    f.plic.tick();
    assert!(!f.meip.is_raised(), "priority must exceed the threshold");

    f.plic.write_u32(THRESHOLD, 1);
    assert!(f.meip.is_raised());
}

#[test]
fn claim_returns_highest_priority_then_lowest_id() {
    let mut f = fixture();
    for (source, prio) in [(2, 3), (5, 6), (9, 6)] {
        f.plic.write_u32(priority(source), prio);
        f.sources[source as usize].raise();
    }
    f.plic.write_u32(ENABLE, (1 << 2) | (1 << 5) | (1 << 9));
    f.plic.tick();

    assert_eq!(f.plic.read_u32(CLAIM), 5);
    assert_eq!(f.plic.read_u32(CLAIM), 9);
    assert_eq!(f.plic.read_u32(CLAIM), 2);
    assert_eq!(f.plic.read_u32(CLAIM), 0);
    assert!(!f.meip.is_raised());
}

#[test]
fn claimed_source_stays_masked_until_complete() {
    let mut f = fixture();
    f.plic.write_u32(priority(3), 1);
    f.plic.write_u32(ENABLE, 1 << 3);
    f.sources[3].raise();
    f.plic.tick();

    assert_eq!(f.plic.claim(0), 3);
    f.plic.tick();
    assert!(!f.plic.is_pending(3), "gateway is closed while claimed");
    assert!(!f.meip.is_raised());

    f.plic.write_u32(CLAIM, 3);
    assert!(f.plic.is_pending(3), "level still high after completion");
    assert!(f.meip.is_raised());
}

#[test]
fn complete_for_disabled_source_is_ignored() {
    let mut f = fixture();
    f.plic.write_u32(priority(3), 1);
    f.plic.write_u32(ENABLE, 1 << 3);
    f.sources[3].raise();
    f.plic.tick();
    assert_eq!(f.plic.claim(0), 3);

    f.plic.write_u32(ENABLE, 0);
    f.plic.complete(0, 3);
    f.plic.write_u32(ENABLE, 1 << 3);
    assert_eq!(f.plic.claim(0), 0, "source is still claimed");
}

#[test]
fn claim_for_missing_context_returns_zero() {
    let mut f = fixture();
    assert_eq!(f.plic.claim(4), 0);
}
