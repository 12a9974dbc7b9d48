//! Memory region acquisition and teardown.
//!
//! Each probe mode obtains a differently sourced region to plant the stub
//! in. The ownership kind recorded at acquisition time is the only thing
//! teardown looks at.

use std::ffi::c_void;
use std::ptr;
use std::str::FromStr;

use nix::errno::Errno;

use crate::capsule::CodeCapsule;
use crate::error::{ProbeError, Result};
use crate::page::PageGeometry;

/// Backing buffer length for the stack and BSS modes: one page of
/// alignment slack plus the stub, for page sizes up to 16 KiB.
pub const PROBE_BUF_LEN: usize = 32 * 1024;

static mut BSS_BUF: [u8; PROBE_BUF_LEN] = [0; PROBE_BUF_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Stack,
    Heap,
    FreedHeap,
    Bss,
    Mmap,
    Memfd,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Stack,
        Mode::Heap,
        Mode::FreedHeap,
        Mode::Bss,
        Mode::Mmap,
        Mode::Memfd,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Mode::Stack => "stack",
            Mode::Heap => "heap",
            Mode::FreedHeap => "freed_heap",
            Mode::Bss => "bss",
            Mode::Mmap => "mmap",
            Mode::Memfd => "memfd",
        }
    }
}

impl FromStr for Mode {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stack" => Ok(Mode::Stack),
            "heap" => Ok(Mode::Heap),
            "freed_heap" => Ok(Mode::FreedHeap),
            "bss" => Ok(Mode::Bss),
            "mmap" => Ok(Mode::Mmap),
            "memfd" => Ok(Mode::Memfd),
            _ => Err(ProbeError::UnknownMode(s.to_string())),
        }
    }
}

/// Release discipline of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Not owned: stack or BSS storage, or heap memory already handed
    /// back to the allocator.
    Static,
    /// Live heap allocation, freed at teardown.
    Dynamic,
    /// Mapped range, unmapped at teardown with its creation length.
    Mapped,
}

#[derive(Debug)]
pub struct MemoryRegion {
    kind: RegionKind,
    base: *mut u8,
    size: usize,
}

impl MemoryRegion {
    /// Obtains a region for `mode`. `stack_buf` must live in the caller's
    /// frame; it only backs the stack mode.
    pub fn acquire(
        mode: Mode,
        geom: &PageGeometry,
        capsule: &CodeCapsule,
        stack_buf: &mut [u8],
    ) -> Result<Self> {
        match mode {
            Mode::Stack => Ok(in_buffer(stack_buf.as_mut_ptr(), stack_buf.len(), geom, capsule)),
            Mode::Bss => {
                let buf = unsafe { &raw mut BSS_BUF } as *mut u8;
                Ok(in_buffer(buf, PROBE_BUF_LEN, geom, capsule))
            }
            Mode::Heap => aligned_heap(RegionKind::Dynamic, geom, capsule),
            Mode::FreedHeap => {
                let region = aligned_heap(RegionKind::Static, geom, capsule)?;
                // Hand the block back before it is ever touched. Writing and
                // executing through the retained pointer afterwards is the
                // whole point of this mode.
                unsafe { libc::free(region.base as *mut c_void) };
                Ok(region)
            }
            Mode::Mmap => anonymous_mapping(capsule),
            Mode::Memfd => memfd_mapping(capsule),
        }
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn base(&self) -> *mut u8 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tears the region down according to its kind. Called exactly once,
    /// at the end of the run.
    pub fn release(self) {
        match self.kind {
            RegionKind::Mapped => {
                // Unmap with the same length the mapping was created with.
                if unsafe { libc::munmap(self.base as *mut c_void, self.size) } != 0 {
                    log::warn!("munmap(0x{:x}) failed: {}", self.base as usize, Errno::last());
                }
            }
            RegionKind::Dynamic => unsafe { libc::free(self.base as *mut c_void) },
            RegionKind::Static => {}
        }
    }
}

/// Region inside an existing buffer (stack or BSS): round the buffer start
/// up to the next page boundary. The buffer must absorb the worst-case
/// alignment loss plus the stub, whatever the page size, or the aligned
/// base would point past memory the buffer owns.
fn in_buffer(
    buf: *mut u8,
    buf_len: usize,
    geom: &PageGeometry,
    capsule: &CodeCapsule,
) -> MemoryRegion {
    assert!(
        geom.page_size() + capsule.len() <= buf_len,
        "backing buffer of {} bytes too small for page size {}",
        buf_len,
        geom.page_size()
    );

    MemoryRegion {
        kind: RegionKind::Static,
        base: geom.align_up(buf as usize) as *mut u8,
        size: capsule.len(),
    }
}

fn aligned_heap(kind: RegionKind, geom: &PageGeometry, capsule: &CodeCapsule) -> Result<MemoryRegion> {
    let mut block: *mut c_void = ptr::null_mut();
    let rc = unsafe {
        libc::posix_memalign(&mut block, geom.page_size(), geom.aligned_size(capsule.len()))
    };
    if rc != 0 {
        return Err(ProbeError::Alloc(Errno::from_raw(rc)));
    }

    Ok(MemoryRegion {
        kind,
        base: block as *mut u8,
        size: capsule.len(),
    })
}

/// Anonymous private mapping created readable, writable and executable;
/// the stub is copied in right away, so no later permission transition is
/// needed.
fn anonymous_mapping(capsule: &CodeCapsule) -> Result<MemoryRegion> {
    let len = capsule.len();
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(ProbeError::Mmap(Errno::last()));
    }

    unsafe { ptr::copy_nonoverlapping(capsule.bytes().as_ptr(), addr as *mut u8, len) };

    Ok(MemoryRegion {
        kind: RegionKind::Mapped,
        base: addr as *mut u8,
        size: len,
    })
}

/// Byte-exact write of the stub into `fd`. Anything other than the full
/// stub length coming back is fatal: a truncated stub must never reach
/// the mapping step.
fn write_stub(fd: libc::c_int, capsule: &CodeCapsule) -> Result<()> {
    let len = capsule.len();
    let written = unsafe { libc::write(fd, capsule.bytes().as_ptr() as *const c_void, len) };
    if written < 0 {
        return Err(ProbeError::MemfdWrite(Errno::last()));
    }
    if written as usize != len {
        return Err(ProbeError::ShortWrite {
            written: written as usize,
            expected: len,
        });
    }

    Ok(())
}

/// Anonymous memory-backed file: the stub bytes go through a byte-exact
/// write, the file is mapped execute-only, and the descriptor is closed
/// immediately after mapping.
fn memfd_mapping(capsule: &CodeCapsule) -> Result<MemoryRegion> {
    let len = capsule.len();

    let fd = unsafe { libc::memfd_create(c"wxprobe_stub".as_ptr(), 0) };
    if fd < 0 {
        return Err(ProbeError::MemfdCreate(Errno::last()));
    }

    if let Err(err) = write_stub(fd, capsule) {
        unsafe { libc::close(fd) };
        return Err(err);
    }

    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_EXEC,
            libc::MAP_PRIVATE,
            fd,
            0,
        )
    };
    unsafe { libc::close(fd) };
    if addr == libc::MAP_FAILED {
        return Err(ProbeError::Mmap(Errno::last()));
    }

    Ok(MemoryRegion {
        kind: RegionKind::Mapped,
        base: addr as *mut u8,
        size: len,
    })
}
