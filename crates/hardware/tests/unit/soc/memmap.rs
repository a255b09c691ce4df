//! Memory Map Tests.
//!
//! Verifies the published OsciBear table and the validation rules applied to
//! any table before composition.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use oscibear_core::common::ConfigError;
use oscibear_core::soc::{DeviceId, MemMap, MemMapEntry, OSCIBEAR_MEMMAP};

fn with_entry(entry: MemMapEntry) -> MemMap {
    let mut entries = [MemMapEntry::new(DeviceId::Debug, 0, 0); DeviceId::COUNT];
    for (slot, e) in entries.iter_mut().zip(OSCIBEAR_MEMMAP.iter()) {
        *slot = *e;
    }
    entries[entry.device.index()] = entry;
    MemMap::new(entries)
}

// ══════════════════════════════════════════════════════════
// 1. Published table
// ══════════════════════════════════════════════════════════

#[rstest]
#[case(DeviceId::Debug, 0x0, 0x1000)]
#[case(DeviceId::SystemControl, 0x2000, 0x1000)]
#[case(DeviceId::Error, 0x3000, 0x1000)]
#[case(DeviceId::BootRom, 0x1_0000, 0x1_0000)]
#[case(DeviceId::TileResetControl, 0x10_0000, 0x1000)]
#[case(DeviceId::Clint, 0x200_0000, 0x1_0000)]
#[case(DeviceId::Plic, 0xc00_0000, 0x400_0000)]
#[case(DeviceId::LbwifRam, 0x1000_0000, 0x1000)]
#[case(DeviceId::QspiControl, 0x1004_0000, 0x1000)]
#[case(DeviceId::QspiXip, 0x2000_0000, 0x10_0000)]
#[case(DeviceId::Uart0, 0x5400_0000, 0x1000)]
#[case(DeviceId::Dtim, 0x8000_0000, 0x8000_8000)]
fn oscibear_entries(#[case] device: DeviceId, #[case] base: u64, #[case] size: u64) {
    assert_eq!(OSCIBEAR_MEMMAP.base(device), base);
    assert_eq!(OSCIBEAR_MEMMAP.size(device), size);
}

#[test]
fn oscibear_table_is_valid() {
    assert_eq!(OSCIBEAR_MEMMAP.validate(), Ok(()));
    assert_eq!(MemMap::default(), OSCIBEAR_MEMMAP);
}

#[test]
fn entries_are_in_identifier_order() {
    let devices: Vec<DeviceId> = OSCIBEAR_MEMMAP.iter().map(|e| e.device).collect();
    assert_eq!(devices, DeviceId::ALL.to_vec());
}

#[test]
fn lookup_finds_owner() {
    assert_eq!(
        OSCIBEAR_MEMMAP.lookup(0x200_bff8).map(|e| e.device),
        Some(DeviceId::Clint)
    );
    assert_eq!(
        OSCIBEAR_MEMMAP.lookup(0x8000_0000).map(|e| e.device),
        Some(DeviceId::Dtim)
    );
    assert_eq!(OSCIBEAR_MEMMAP.lookup(0x1000), None, "gap between debug and system control");
}

// ══════════════════════════════════════════════════════════
// 2. Validation
// ══════════════════════════════════════════════════════════

#[test]
fn overlap_is_rejected() {
    let map = with_entry(MemMapEntry::new(DeviceId::Plic, 0x200_8000, 0x1000));
    assert_eq!(
        map.validate(),
        Err(ConfigError::OverlappingRegions {
            first: DeviceId::Clint,
            first_base: 0x200_0000,
            first_end: 0x201_0000,
            second: DeviceId::Plic,
            second_base: 0x200_8000,
            second_end: 0x200_9000,
        })
    );
}

#[test]
fn empty_region_is_rejected() {
    let map = with_entry(MemMapEntry::new(DeviceId::Uart0, 0x5400_0000, 0));
    assert_eq!(map.validate(), Err(ConfigError::EmptyRegion(DeviceId::Uart0)));
}

#[test]
fn wrapping_region_is_rejected() {
    let map = with_entry(MemMapEntry::new(DeviceId::Dtim, u64::MAX - 0xff, 0x1000));
    assert_eq!(
        map.validate(),
        Err(ConfigError::RegionOverflow {
            device: DeviceId::Dtim,
            base: u64::MAX - 0xff,
            size: 0x1000,
        })
    );
}

#[test]
fn misplaced_entry_is_rejected() {
    let mut entries: Vec<MemMapEntry> = OSCIBEAR_MEMMAP.iter().copied().collect();
    entries.swap(0, 1);
    let entries: [MemMapEntry; DeviceId::COUNT] = entries.try_into().unwrap();
    assert_eq!(
        MemMap::new(entries).validate(),
        Err(ConfigError::MisplacedEntry {
            index: 0,
            expected: DeviceId::Debug,
            found: DeviceId::SystemControl,
        })
    );
}

#[test]
fn adjacent_ranges_do_not_overlap() {
    let a = MemMapEntry::new(DeviceId::Debug, 0x0, 0x1000);
    let b = MemMapEntry::new(DeviceId::Error, 0x1000, 0x1000);
    assert!(!a.overlaps(&b));
    assert!(!b.overlaps(&a));
}

// ══════════════════════════════════════════════════════════
// 3. Properties
// ══════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn every_mapped_address_has_exactly_one_owner(addr in any::<u64>()) {
        let owners = OSCIBEAR_MEMMAP.iter().filter(|e| e.contains(addr)).count();
        prop_assert!(owners <= 1);
        prop_assert_eq!(owners == 1, OSCIBEAR_MEMMAP.lookup(addr).is_some());
    }

    #[test]
    fn overlap_is_symmetric(
        a_base in 0u64..0x1_0000, a_size in 1u64..0x1000,
        b_base in 0u64..0x1_0000, b_size in 1u64..0x1000,
    ) {
        let a = MemMapEntry::new(DeviceId::Debug, a_base, a_size);
        let b = MemMapEntry::new(DeviceId::Error, b_base, b_size);
        let brute = (a_base..a_base + a_size).any(|x| b.contains(x));
        prop_assert_eq!(a.overlaps(&b), brute);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }
}
