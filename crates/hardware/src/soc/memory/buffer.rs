//! RAM Buffer Implementation.
//!
//! This module provides a safe wrapper around raw memory allocation for RAM regions.
//! It supports lazy allocation via `mmap` on Unix systems so that the 2 GiB DTIM
//! window costs nothing until it is touched. Every access is bounds-checked; out-of-range
//! accesses are reported rather than performed.

use std::io;
use std::slice;

/// Extra `mmap` flags: do not reserve swap for a mostly untouched mapping.
#[cfg(target_os = "linux")]
const MAP_EXTRA_FLAGS: libc::c_int = libc::MAP_NORESERVE;
#[cfg(all(unix, not(target_os = "linux")))]
const MAP_EXTRA_FLAGS: libc::c_int = 0;

#[cfg(target_os = "linux")]
fn page_size() -> usize {
    // SAFETY: `sysconf` has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size).ok().filter(|&s| s > 0).unwrap_or(4096)
}

/// A zero-initialized byte buffer backing a RAM region.
///
/// On Unix systems, this uses `mmap` to allocate anonymous memory, which allows
/// for lazy allocation (pages are only allocated by the OS when accessed).
pub struct DramBuffer {
    ptr: *mut u8,
    size: usize,
}

// SAFETY: the buffer owns its mapping exclusively; `&mut self` guards every write.
unsafe impl Send for DramBuffer {}
// SAFETY: shared references only read.
unsafe impl Sync for DramBuffer {}

impl DramBuffer {
    /// Creates a new buffer of the specified size.
    ///
    /// On Unix, uses `mmap` for lazy allocation; on other platforms, allocates a `Vec`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mapping cannot be created, or `InvalidInput` for a
    /// zero size.
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "RAM buffer size must be non-zero",
            ));
        }

        #[cfg(unix)]
        {
            // SAFETY: anonymous private mapping with no address hint; the result is checked.
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | MAP_EXTRA_FLAGS,
                    -1,
                    0,
                )
            };

            if ptr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                ptr: ptr.cast::<u8>(),
                size,
            })
        }

        #[cfg(not(unix))]
        {
            let mut vec = std::mem::ManuallyDrop::new(vec![0u8; size]);
            Ok(Self {
                ptr: vec.as_mut_ptr(),
                size,
            })
        }
    }

    /// Returns the size of the buffer in bytes.
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns whether the buffer is empty (never true for a constructed buffer).
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn in_bounds(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.size)
    }

    /// Returns `len` bytes starting at `offset`, or `None` if out of range.
    pub fn read_slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        if !self.in_bounds(offset, len) {
            return None;
        }
        // SAFETY: range checked above; the mapping lives as long as `self`.
        Some(unsafe { slice::from_raw_parts(self.ptr.add(offset), len) })
    }

    /// Copies `data` to `offset`; returns `false` (writing nothing) if out of range.
    pub fn write_slice(&mut self, offset: usize, data: &[u8]) -> bool {
        if !self.in_bounds(offset, data.len()) {
            return false;
        }
        // SAFETY: range checked above; `&mut self` excludes concurrent readers.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), data.len());
        }
        true
    }

    /// Zeroes `len` bytes at `offset`; returns `false` (writing nothing) if out of range.
    ///
    /// On Linux the page-aligned interior is dropped with `MADV_DONTNEED`, so clearing a
    /// large range neither copies nor commits memory; only the unaligned edges are written.
    pub fn zero_range(&mut self, offset: usize, len: usize) -> bool {
        if !self.in_bounds(offset, len) {
            return false;
        }

        #[cfg(target_os = "linux")]
        {
            let page = page_size();
            let start = offset.next_multiple_of(page);
            let end = (offset + len) / page * page;
            if start < end {
                // SAFETY: `[start, end)` lies inside the private anonymous mapping.
                let rc = unsafe {
                    libc::madvise(self.ptr.add(start).cast(), end - start, libc::MADV_DONTNEED)
                };
                if rc == 0 {
                    self.zero_bytes(offset, start - offset);
                    self.zero_bytes(end, offset + len - end);
                    return true;
                }
            }
        }

        self.zero_bytes(offset, len);
        true
    }

    fn zero_bytes(&mut self, offset: usize, len: usize) {
        // SAFETY: callers pass a range inside the buffer.
        unsafe {
            std::ptr::write_bytes(self.ptr.add(offset), 0, len);
        }
    }

    /// Reads a single byte, or `None` if out of range.
    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.read_slice(offset, 1).map(|s| s[0])
    }

    /// Writes a single byte; returns `false` if out of range.
    pub fn write_u8(&mut self, offset: usize, val: u8) -> bool {
        self.write_slice(offset, &[val])
    }
}

impl Drop for DramBuffer {
    /// Releases the backing memory.
    fn drop(&mut self) {
        #[cfg(unix)]
        // SAFETY: `ptr`/`size` describe the mapping created in `new`.
        unsafe {
            let _ = libc::munmap(self.ptr.cast(), self.size);
        }
        #[cfg(not(unix))]
        // SAFETY: `ptr`/`size` came from a `Vec<u8>` with equal length and capacity.
        unsafe {
            drop(Vec::from_raw_parts(self.ptr, self.size, self.size));
        }
    }
}
