//! Code placement and page permission transitions for non-mapped regions.
//!
//! Mapped regions get their bytes and final permissions at creation and
//! are never touched here.

use std::ffi::c_void;
use std::ptr;

use nix::errno::Errno;

use crate::capsule::CodeCapsule;
use crate::page::PageGeometry;
use crate::region::{MemoryRegion, RegionKind};

/// Copies the stub into the region and flips its pages to execute-only.
///
/// A refused mprotect is logged and ignored on purpose: whether the
/// upcoming call then succeeds or faults is the observation this tool
/// exists to make.
pub fn stage(region: &MemoryRegion, geom: &PageGeometry, capsule: &CodeCapsule) {
    if region.kind() == RegionKind::Mapped {
        return;
    }

    unsafe { ptr::copy_nonoverlapping(capsule.bytes().as_ptr(), region.base(), capsule.len()) };
    protect(region, geom, capsule.len(), libc::PROT_EXEC, "PROT_EXEC");
}

/// Returns the pages to read+write after the invocation, so the allocator
/// sees ordinary memory again. Failure is logged, not fatal.
pub fn restore(region: &MemoryRegion, geom: &PageGeometry, len: usize) {
    if region.kind() == RegionKind::Mapped {
        return;
    }

    protect(
        region,
        geom,
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        "PROT_READ|PROT_WRITE",
    );
}

fn protect(region: &MemoryRegion, geom: &PageGeometry, len: usize, prot: i32, label: &str) {
    let target = geom.align_down(region.base() as usize);
    let length = geom.aligned_size(len);

    let rc = unsafe { libc::mprotect(target as *mut c_void, length, prot) };
    if rc != 0 {
        log::warn!(
            "mprotect({}) failed on 0x{:x}+0x{:x}: {}",
            label,
            target,
            length,
            Errno::last()
        );
    }
}
