//! Boot-image loader.
//!
//! This module places firmware or kernel images into the composed address space. It performs:
//! 1. **Reading:** The whole file is read synchronously; an empty or unreadable file is fatal.
//! 2. **Parsing:** Files starting with the ELF magic are parsed (ELF32 or ELF64, RISC-V);
//!    anything else is a raw image placed at the RAM base.
//! 3. **Validation:** Every segment and the entry point are checked against the RAM window
//!    before the first byte is written, so a rejected image leaves memory untouched.
//! 4. **Placement:** `PT_LOAD` segments land at their physical address; the `.bss` tail of
//!    each segment is zero-filled.

use std::fmt;
use std::fs;
use std::path::Path;

use object::elf::{ELFMAG, EM_RISCV, FileHeader32, FileHeader64, PT_LOAD};
use object::{Endianness, FileKind};
use object::read::elf::{FileHeader, ProgramHeader};
use tracing::{debug, info};

use crate::common::BootImageError;
use crate::soc::interconnect::Bus;

/// Recognized image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// ELF executable with its own entry point.
    Elf {
        /// Register width the image was built for (32 or 64).
        xlen: u32,
    },
    /// Opaque bytes placed at the RAM base.
    Raw,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf { xlen } => write!(f, "ELF{xlen}"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

/// One contiguous range written by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Physical address of the first byte.
    pub addr: u64,
    /// Bytes copied from the file.
    pub file_len: u64,
    /// Total bytes written, including the zero-filled tail.
    pub mem_len: u64,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Format the image was recognized as.
    pub format: ImageFormat,
    /// Address execution should start from.
    pub entry: u64,
    /// Total bytes written into the address space.
    pub bytes_written: u64,
    /// Ranges written, in file order.
    pub placements: Vec<Placement>,
}

struct Segment<'data> {
    addr: u64,
    bytes: &'data [u8],
    mem_len: u64,
}

struct ParsedImage<'data> {
    format: ImageFormat,
    entry: u64,
    segments: Vec<Segment<'data>>,
}

/// Loads the image at `path` into `[ram_base, ram_base + ram_size)`.
///
/// # Arguments
///
/// * `bus` - The composed address space.
/// * `path` - Image file.
/// * `ram_base` - Base of the RAM window; raw images land here.
/// * `ram_size` - Size of the RAM window.
///
/// # Errors
///
/// `BootImageError` if the file is unreadable, empty, a malformed ELF, or does not fit the
/// RAM window. On error nothing has been written.
pub fn load_boot_image(
    bus: &mut Bus,
    path: &Path,
    ram_base: u64,
    ram_size: u64,
) -> Result<LoadedImage, BootImageError> {
    let data = fs::read(path).map_err(|source| BootImageError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if data.is_empty() {
        return Err(BootImageError::Empty {
            path: path.to_path_buf(),
        });
    }

    let image = if data.starts_with(&ELFMAG) {
        parse_elf(&data).map_err(|reason| BootImageError::Malformed {
            path: path.to_path_buf(),
            reason,
        })?
    } else {
        if data.len() as u64 > ram_size {
            return Err(BootImageError::TooLarge {
                path: path.to_path_buf(),
                size: data.len() as u64,
                base: ram_base,
                limit: ram_size,
            });
        }
        ParsedImage {
            format: ImageFormat::Raw,
            entry: ram_base,
            segments: vec![Segment {
                addr: ram_base,
                bytes: &data,
                mem_len: data.len() as u64,
            }],
        }
    };

    validate(&image, path, ram_base, ram_size)?;

    let mut placements = Vec::with_capacity(image.segments.len());
    for seg in &image.segments {
        let write_err = |source| BootImageError::Write {
            path: path.to_path_buf(),
            source,
        };
        bus.load_binary_at(seg.bytes, seg.addr).map_err(write_err)?;
        let file_len = seg.bytes.len() as u64;
        let zero_len = seg.mem_len - file_len;
        // Fresh RAM is already zero, but a segment may overlap bytes written earlier.
        bus.zero_fill(seg.addr + file_len, zero_len)
            .map_err(write_err)?;
        debug!(
            addr = format_args!("{:#x}", seg.addr),
            file_len,
            mem_len = seg.mem_len,
            "placed boot image segment"
        );
        placements.push(Placement {
            addr: seg.addr,
            file_len,
            mem_len: seg.mem_len,
        });
    }

    let bytes_written = placements.iter().map(|p| p.mem_len).sum();
    info!(
        path = %path.display(),
        format = %image.format,
        entry = format_args!("{:#x}", image.entry),
        bytes_written,
        "loaded boot image"
    );
    Ok(LoadedImage {
        format: image.format,
        entry: image.entry,
        bytes_written,
        placements,
    })
}

/// Checks every segment and the entry point against the RAM window.
fn validate(
    image: &ParsedImage<'_>,
    path: &Path,
    ram_base: u64,
    ram_size: u64,
) -> Result<(), BootImageError> {
    let ram_end = ram_base.saturating_add(ram_size);
    let total: u64 = image.segments.iter().map(|s| s.mem_len).sum();
    if total > ram_size {
        return Err(BootImageError::TooLarge {
            path: path.to_path_buf(),
            size: total,
            base: ram_base,
            limit: ram_size,
        });
    }
    for seg in &image.segments {
        let inside = seg.addr >= ram_base
            && seg
                .addr
                .checked_add(seg.mem_len)
                .is_some_and(|end| end <= ram_end);
        if !inside {
            return Err(BootImageError::SegmentOutOfRange {
                path: path.to_path_buf(),
                addr: seg.addr,
                len: seg.mem_len,
                base: ram_base,
                end: ram_end,
            });
        }
    }
    if image.entry < ram_base || image.entry >= ram_end {
        return Err(BootImageError::EntryOutOfRange {
            path: path.to_path_buf(),
            entry: image.entry,
            base: ram_base,
            end: ram_end,
        });
    }
    Ok(())
}

fn parse_elf(data: &[u8]) -> Result<ParsedImage<'_>, String> {
    match FileKind::parse(data).map_err(|e| e.to_string())? {
        FileKind::Elf32 => parse_elf_class::<FileHeader32<Endianness>>(data, 32),
        FileKind::Elf64 => parse_elf_class::<FileHeader64<Endianness>>(data, 64),
        kind => Err(format!("unsupported object format {kind:?}")),
    }
}

fn parse_elf_class<Elf>(data: &[u8], xlen: u32) -> Result<ParsedImage<'_>, String>
where
    Elf: FileHeader<Endian = Endianness>,
{
    let header = Elf::parse(data).map_err(|e| e.to_string())?;
    let endian = header.endian().map_err(|e| e.to_string())?;
    let machine = header.e_machine(endian);
    if machine != EM_RISCV {
        return Err(format!("not a RISC-V image (e_machine {machine})"));
    }

    let mut segments = Vec::new();
    for ph in header
        .program_headers(endian, data)
        .map_err(|e| e.to_string())?
    {
        if ph.p_type(endian) != PT_LOAD {
            continue;
        }
        let addr: u64 = ph.p_paddr(endian).into();
        let file_len: u64 = ph.p_filesz(endian).into();
        let mem_len: u64 = ph.p_memsz(endian).into();
        if mem_len < file_len {
            return Err(format!(
                "segment at {addr:#x} has memsz {mem_len:#x} smaller than filesz {file_len:#x}"
            ));
        }
        let bytes = ph
            .data(endian, data)
            .map_err(|()| format!("segment at {addr:#x} extends past the end of the file"))?;
        if mem_len == 0 {
            continue;
        }
        segments.push(Segment {
            addr,
            bytes,
            mem_len,
        });
    }
    if segments.is_empty() {
        return Err("no loadable segments".into());
    }

    Ok(ParsedImage {
        format: ImageFormat::Elf { xlen },
        entry: header.e_entry(endian).into(),
        segments,
    })
}
