//! Boot-Image Loader Tests.
//!
//! Raw and ELF placement, `.bss` zero-fill, and the guarantee that a rejected
//! image leaves RAM untouched.

use std::path::Path;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use oscibear_core::common::BootImageError;
use oscibear_core::sim::{ImageFormat, Placement, load_boot_image};
use oscibear_core::soc::Bus;
use oscibear_core::soc::memory::Memory;

use crate::common::images::{EM_RISCV, ElfSegment, elf32, elf64, temp_image};

const RAM_BASE: u64 = 0x8000_0000;
const RAM_SIZE: u64 = 0x1000;

fn bus() -> Bus {
    let mut bus = Bus::new();
    let ram = Memory::allocate("dtim", RAM_BASE, RAM_SIZE).unwrap();
    let _ = bus.add_device(Box::new(ram)).unwrap();
    bus
}

fn load(bus: &mut Bus, bytes: &[u8]) -> Result<oscibear_core::sim::LoadedImage, BootImageError> {
    let file = temp_image(bytes);
    load_boot_image(bus, file.path(), RAM_BASE, RAM_SIZE)
}

// ══════════════════════════════════════════════════════════
// 1. Raw images
// ══════════════════════════════════════════════════════════

#[test]
fn raw_image_lands_at_ram_base() {
    let mut bus = bus();
    let image = load(&mut bus, &[0x13, 0x00, 0x00, 0x00, 0x6f, 0x00]).unwrap();
    assert_eq!(image.format, ImageFormat::Raw);
    assert_eq!(image.entry, RAM_BASE);
    assert_eq!(image.bytes_written, 6);
    assert_eq!(bus.read_u32(RAM_BASE), 0x13);
    assert_eq!(bus.read_u16(RAM_BASE + 4), 0x6f);
}

#[test]
fn raw_image_larger_than_ram_is_rejected() {
    let mut bus = bus();
    let err = load(&mut bus, &vec![0xAA; RAM_SIZE as usize + 1]).unwrap_err();
    assert!(matches!(
        err,
        BootImageError::TooLarge {
            size,
            limit: RAM_SIZE,
            ..
        } if size == RAM_SIZE + 1
    ));
    assert_eq!(bus.read_u32(RAM_BASE), 0, "nothing was written");
}

#[test]
fn raw_image_filling_ram_exactly_fits() {
    let mut bus = bus();
    let image = load(&mut bus, &vec![0x55; RAM_SIZE as usize]).unwrap();
    assert_eq!(image.bytes_written, RAM_SIZE);
    assert_eq!(bus.read_u8(RAM_BASE + RAM_SIZE - 1), 0x55);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn raw_load_is_all_or_nothing(len in 1usize..=(2 * RAM_SIZE as usize), fill in 1u8..=255) {
        let mut bus = bus();
        let result = load(&mut bus, &vec![fill; len]);
        if len as u64 > RAM_SIZE {
            let too_large = matches!(result, Err(BootImageError::TooLarge { .. }));
            prop_assert!(too_large);
            prop_assert_eq!(bus.read_u8(RAM_BASE), 0);
        } else {
            prop_assert_eq!(result.map(|image| image.bytes_written).ok(), Some(len as u64));
            prop_assert_eq!(bus.read_u8(RAM_BASE + len as u64 - 1), fill);
        }
    }
}

// ══════════════════════════════════════════════════════════
// 2. File errors
// ══════════════════════════════════════════════════════════

#[test]
fn empty_file_is_rejected() {
    let mut bus = bus();
    assert!(matches!(load(&mut bus, &[]), Err(BootImageError::Empty { .. })));
}

#[test]
fn missing_file_is_unreadable() {
    let mut bus = bus();
    let err = load_boot_image(
        &mut bus,
        Path::new("/nonexistent/oscibear/kernel.elf"),
        RAM_BASE,
        RAM_SIZE,
    )
    .unwrap_err();
    assert!(matches!(err, BootImageError::Unreadable { .. }));
    assert!(err.to_string().contains("kernel.elf"));
}

// ══════════════════════════════════════════════════════════
// 3. ELF images
// ══════════════════════════════════════════════════════════

#[test]
fn elf64_segments_land_at_physical_addresses() {
    let mut bus = bus();
    let text = [0x97, 0x02, 0x00, 0x00];
    let data = [0xEF, 0xBE, 0xAD, 0xDE];
    let bytes = elf64(
        EM_RISCV,
        RAM_BASE + 0x100,
        &[
            ElfSegment::new(RAM_BASE + 0x100, &text),
            ElfSegment::new(RAM_BASE + 0x800, &data),
        ],
    );
    let image = load(&mut bus, &bytes).unwrap();

    assert_eq!(image.format, ImageFormat::Elf { xlen: 64 });
    assert_eq!(image.entry, RAM_BASE + 0x100);
    assert_eq!(
        image.placements,
        vec![
            Placement {
                addr: RAM_BASE + 0x100,
                file_len: 4,
                mem_len: 4,
            },
            Placement {
                addr: RAM_BASE + 0x800,
                file_len: 4,
                mem_len: 4,
            },
        ]
    );
    assert_eq!(bus.read_u32(RAM_BASE + 0x100), 0x0000_0297);
    assert_eq!(bus.read_u32(RAM_BASE + 0x800), 0xDEAD_BEEF);
}

#[test]
fn elf32_is_recognized() {
    let mut bus = bus();
    let bytes = elf32(
        EM_RISCV,
        (RAM_BASE + 4) as u32,
        &[ElfSegment::new(RAM_BASE, &[1, 2, 3, 4, 5, 6, 7, 8])],
    );
    let image = load(&mut bus, &bytes).unwrap();
    assert_eq!(image.format, ImageFormat::Elf { xlen: 32 });
    assert_eq!(image.format.to_string(), "ELF32");
    assert_eq!(image.entry, RAM_BASE + 4);
    assert_eq!(bus.read_u64(RAM_BASE), 0x0807_0605_0403_0201);
}

#[test]
fn bss_tail_is_zero_filled() {
    let mut bus = bus();
    // Leave stale bytes where .bss will land.
    bus.write_u64(RAM_BASE + 8, u64::MAX);

    let segment = ElfSegment {
        paddr: RAM_BASE,
        data: vec![0x11; 8],
        memsz: 0x20,
    };
    let image = load(&mut bus, &elf64(EM_RISCV, RAM_BASE, &[segment])).unwrap();
    assert_eq!(image.bytes_written, 0x20);
    assert_eq!(bus.read_u64(RAM_BASE), 0x1111_1111_1111_1111);
    assert_eq!(bus.read_u64(RAM_BASE + 8), 0);
}

#[test]
fn large_bss_is_cleared_without_touching_file_bytes() {
    const BIG_RAM: u64 = 64 << 20;
    let mut bus = Bus::new();
    let ram = Memory::allocate("dtim", RAM_BASE, BIG_RAM).unwrap();
    let _ = bus.add_device(Box::new(ram)).unwrap();
    // Dirty bytes at both ends of the .bss and one page in the middle.
    bus.write_u32(RAM_BASE + 0x10, 0xFFFF_FFFF);
    bus.write_u32(RAM_BASE + BIG_RAM / 2, 0xFFFF_FFFF);
    bus.write_u32(RAM_BASE + BIG_RAM - 4, 0xFFFF_FFFF);

    let segment = ElfSegment {
        paddr: RAM_BASE,
        data: vec![0x22; 0x10],
        memsz: BIG_RAM,
    };
    let file = temp_image(&elf64(EM_RISCV, RAM_BASE, &[segment]));
    let image = load_boot_image(&mut bus, file.path(), RAM_BASE, BIG_RAM).unwrap();

    assert_eq!(image.bytes_written, BIG_RAM);
    assert_eq!(bus.read_u8(RAM_BASE + 0xf), 0x22);
    assert_eq!(bus.read_u32(RAM_BASE + 0x10), 0);
    assert_eq!(bus.read_u32(RAM_BASE + BIG_RAM / 2), 0);
    assert_eq!(bus.read_u32(RAM_BASE + BIG_RAM - 4), 0);
}

#[test]
fn segment_outside_ram_is_rejected_before_writing() {
    let mut bus = bus();
    let bytes = elf64(
        EM_RISCV,
        RAM_BASE,
        &[
            ElfSegment::new(RAM_BASE, &[0xAA; 4]),
            ElfSegment::new(RAM_BASE + RAM_SIZE - 2, &[0xBB; 4]),
        ],
    );
    let err = load(&mut bus, &bytes).unwrap_err();
    assert!(matches!(
        err,
        BootImageError::SegmentOutOfRange { addr, len: 4, .. } if addr == RAM_BASE + RAM_SIZE - 2
    ));
    assert_eq!(bus.read_u32(RAM_BASE), 0, "first segment was not written either");
}

#[test]
fn entry_outside_ram_is_rejected() {
    let mut bus = bus();
    let bytes = elf64(EM_RISCV, 0x1_0000, &[ElfSegment::new(RAM_BASE, &[0xAA; 4])]);
    assert!(matches!(
        load(&mut bus, &bytes),
        Err(BootImageError::EntryOutOfRange { entry: 0x1_0000, .. })
    ));
    assert_eq!(bus.read_u32(RAM_BASE), 0);
}

#[test]
fn foreign_machine_is_malformed() {
    let mut bus = bus();
    const EM_X86_64: u16 = 62;
    let bytes = elf64(EM_X86_64, RAM_BASE, &[ElfSegment::new(RAM_BASE, &[0; 4])]);
    let err = load(&mut bus, &bytes).unwrap_err();
    match err {
        BootImageError::Malformed { reason, .. } => assert!(reason.contains("RISC-V")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn unknown_elf_class_is_malformed() {
    let mut bus = bus();
    let mut bytes = elf64(EM_RISCV, RAM_BASE, &[ElfSegment::new(RAM_BASE, &[0xAA; 4])]);
    // EI_CLASS: neither ELFCLASS32 nor ELFCLASS64.
    bytes[4] = 3;
    assert!(matches!(
        load(&mut bus, &bytes),
        Err(BootImageError::Malformed { .. })
    ));
    assert_eq!(bus.read_u32(RAM_BASE), 0);
}

#[test]
fn elf_without_loadable_segments_is_malformed() {
    let mut bus = bus();
    let bytes = elf64(EM_RISCV, RAM_BASE, &[]);
    assert!(matches!(
        load(&mut bus, &bytes),
        Err(BootImageError::Malformed { .. })
    ));
}

#[test]
fn truncated_elf_is_malformed() {
    let mut bus = bus();
    let bytes = elf64(EM_RISCV, RAM_BASE, &[ElfSegment::new(RAM_BASE, &[0; 4])]);
    assert!(matches!(
        load(&mut bus, &bytes[..20]),
        Err(BootImageError::Malformed { .. })
    ));
}

#[test]
fn memsz_smaller_than_filesz_is_malformed() {
    let mut bus = bus();
    let segment = ElfSegment {
        paddr: RAM_BASE,
        data: vec![0; 8],
        memsz: 4,
    };
    assert!(matches!(
        load(&mut bus, &elf64(EM_RISCV, RAM_BASE, &[segment])),
        Err(BootImageError::Malformed { .. })
    ));
}
