//! Address Space Tests.
//!
//! Verifies region registration, overlap rejection, routing of sized accesses,
//! open-bus behavior, and all-or-nothing binary placement.

use pretty_assertions::assert_eq;

use oscibear_core::common::{BusError, RealizeError};
use oscibear_core::soc::devices::{Rom, Unimplemented};
use oscibear_core::soc::memory::Memory;
use oscibear_core::soc::{Bus, RegionInfo};

fn ram(name: &str, base: u64, size: u64) -> Box<Memory> {
    Box::new(Memory::allocate(name, base, size).unwrap())
}

// ══════════════════════════════════════════════════════════
// 1. Registration
// ══════════════════════════════════════════════════════════

#[test]
fn add_device_returns_region() {
    let mut bus = Bus::new();
    let region = bus.add_device(ram("ram", 0x8000_0000, 0x1000)).unwrap();
    assert_eq!(
        region,
        RegionInfo {
            name: "ram".into(),
            base: 0x8000_0000,
            size: 0x1000,
        }
    );
    assert_eq!(region.end(), 0x8000_1000);
    assert_eq!(bus.len(), 1);
}

#[test]
fn regions_are_sorted_by_base() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("high", 0x8000_0000, 0x1000)).unwrap();
    let _ = bus.add_device(ram("low", 0x1000, 0x1000)).unwrap();
    let _ = bus
        .add_device(Box::new(Unimplemented::new("mid", 0x4000, 0x100)))
        .unwrap();

    let names: Vec<String> = bus.regions().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["low", "mid", "high"]);
}

#[test]
fn overlapping_region_is_rejected() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x1000)).unwrap();
    let err = bus.add_device(ram("b", 0x1800, 0x1000)).unwrap_err();
    assert_eq!(
        err,
        RealizeError::RegionOverlap {
            name: "b".into(),
            base: 0x1800,
            size: 0x1000,
            other: "a".into(),
        }
    );
    assert_eq!(bus.len(), 1, "rejected region is not mapped");
}

#[test]
fn containing_region_is_rejected() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("inner", 0x2000, 0x100)).unwrap();
    assert!(bus.add_device(ram("outer", 0x1000, 0x4000)).is_err());
}

#[test]
fn adjacent_regions_are_accepted() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x1000)).unwrap();
    let _ = bus.add_device(ram("b", 0x2000, 0x1000)).unwrap();
    assert_eq!(bus.len(), 2);
}

#[test]
fn region_lookup_by_name() {
    let mut bus = Bus::new();
    let _ = bus
        .add_device(Box::new(Rom::new("boot-rom", 0x1_0000, 0x100, 0)))
        .unwrap();
    assert_eq!(bus.region("boot-rom").map(|r| r.base), Some(0x1_0000));
    assert!(bus.region("missing").is_none());
}

// ══════════════════════════════════════════════════════════
// 2. Routing
// ══════════════════════════════════════════════════════════

#[test]
fn sized_accesses_reach_the_owner() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x1000)).unwrap();
    let _ = bus.add_device(ram("b", 0x8000_0000, 0x1000)).unwrap();

    bus.write_u64(0x8000_0010, 0x1122_3344_5566_7788);
    bus.write_u32(0x1004, 0xDEAD_BEEF);
    assert_eq!(bus.read_u64(0x8000_0010), 0x1122_3344_5566_7788);
    assert_eq!(bus.read_u32(0x8000_0010), 0x5566_7788);
    assert_eq!(bus.read_u16(0x8000_0016), 0x1122);
    assert_eq!(bus.read_u8(0x1007), 0xDE);
    assert_eq!(bus.read_u32(0x1004), 0xDEAD_BEEF);
}

#[test]
fn unmapped_reads_return_zero() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x1000)).unwrap();
    bus.write_u32(0x9000, 0xFFFF_FFFF);
    assert_eq!(bus.read_u32(0x9000), 0);
    assert!(!bus.is_valid_address(0x9000));
    assert!(bus.is_valid_address(0x1fff));
}

// ══════════════════════════════════════════════════════════
// 3. Binary loading
// ══════════════════════════════════════════════════════════

#[test]
fn load_binary_inside_region() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x100)).unwrap();
    bus.load_binary_at(&[1, 2, 3, 4], 0x10fc).unwrap();
    assert_eq!(bus.read_u32(0x10fc), 0x0403_0201);
}

#[test]
fn load_binary_past_region_end_writes_nothing() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x100)).unwrap();
    let err = bus.load_binary_at(&[0xAA; 8], 0x10fc).unwrap_err();
    assert_eq!(err, BusError::Unmapped { addr: 0x10fc, len: 8 });
    assert_eq!(bus.read_u32(0x10fc), 0);
}

#[test]
fn load_binary_spanning_two_regions_is_rejected() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x100)).unwrap();
    let _ = bus.add_device(ram("b", 0x1100, 0x100)).unwrap();
    assert!(bus.load_binary_at(&[0xAA; 8], 0x10fc).is_err());
    assert_eq!(bus.read_u32(0x10fc), 0);
    assert_eq!(bus.read_u32(0x1100), 0);
}

#[test]
fn load_binary_unmapped_is_rejected() {
    let mut bus = Bus::new();
    assert!(bus.load_binary_at(&[1], 0x0).is_err());
}

#[test]
fn zero_fill_clears_inside_region() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x100)).unwrap();
    bus.load_binary_at(&[0xFF; 0x100], 0x1000).unwrap();
    bus.zero_fill(0x1004, 0x80).unwrap();
    assert_eq!(bus.read_u32(0x1000), 0xFFFF_FFFF);
    assert_eq!(bus.read_u64(0x1004), 0);
    assert_eq!(bus.read_u32(0x1080), 0);
    assert_eq!(bus.read_u32(0x1084), 0xFFFF_FFFF);
}

#[test]
fn zero_fill_past_region_end_writes_nothing() {
    let mut bus = Bus::new();
    let _ = bus.add_device(ram("a", 0x1000, 0x100)).unwrap();
    bus.load_binary_at(&[0xFF; 0x100], 0x1000).unwrap();
    let err = bus.zero_fill(0x10f0, 0x20).unwrap_err();
    assert_eq!(err, BusError::Unmapped { addr: 0x10f0, len: 0x20 });
    assert_eq!(bus.read_u32(0x10f0), 0xFFFF_FFFF);
    assert!(bus.zero_fill(0x0, 1).is_err());
    assert_eq!(bus.zero_fill(0x0, 0), Ok(()));
}
