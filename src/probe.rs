//! The probe pipeline: acquire, place, flip, call, restore, release.

use log::debug;

use crate::capsule::{CodeCapsule, Payload};
use crate::error::Result;
use crate::page::PageGeometry;
use crate::region::{MemoryRegion, Mode, PROBE_BUF_LEN};
use crate::{invoke, protect};

/// Runs one probe: obtains memory via `mode`, plants the stub, attempts
/// the control transfer into it, then restores and releases the region.
///
/// A refused permission transition does not abort the run. A fault during
/// the transfer kills the process; the caller observes that through the
/// exit status, not through this function's return value.
pub fn run(mode: Mode, payload: Payload) -> Result<()> {
    let geom = PageGeometry::current();
    let capsule = CodeCapsule::current();
    // Backs the stack mode; must live in this frame.
    let mut stack_buf = [0u8; PROBE_BUF_LEN];

    debug!(
        "mode={:?} page_size={} stub_len={}",
        mode,
        geom.page_size(),
        capsule.len()
    );

    let region = MemoryRegion::acquire(mode, &geom, &capsule, &mut stack_buf)?;
    debug!(
        "region kind={:?} base=0x{:x} size={}",
        region.kind(),
        region.base() as usize,
        region.size()
    );

    protect::stage(&region, &geom, &capsule);
    unsafe { invoke::invoke_raw(region.base(), payload) };
    protect::restore(&region, &geom, capsule.len());

    region.release();
    Ok(())
}
