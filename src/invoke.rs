//! The raw control-transfer boundary.

use std::mem;

use crate::capsule::Payload;

/// Reinterprets `base` as the relocated trampoline's entry point and calls
/// it with the payload. Two-hop transfer: region entry first, payload
/// second.
///
/// # Safety
///
/// `base` must hold a verbatim copy of the trampoline stub. If the pages
/// behind it are not executable the call faults and the process dies; that
/// outcome is part of the measurement and deliberately not guarded
/// against.
pub unsafe fn invoke_raw(base: *mut u8, payload: Payload) {
    let entry: extern "C" fn(Payload) = unsafe { mem::transmute(base) };
    entry(payload);
}
