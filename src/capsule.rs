//! The relocatable code capsule and its link-time byte range.
//!
//! The trampoline below is the only code that ever runs out of a probed
//! region. It lives in its own link section so the rest of the program can
//! treat it as a plain byte range: the linker emits `__start_`/`__stop_`
//! encapsulation symbols for any section whose name is a valid C
//! identifier, and those give the copyable `[start, stop)` bounds.

use std::slice;

/// Opaque zero-argument callable handed through the stub.
pub type Payload = extern "C" fn();

/// Relocatable stub: takes the payload and calls it. The body is a single
/// indirect call through its argument register, so the machine code works
/// unchanged at any address it is copied to.
#[unsafe(link_section = "wxprobe_stub")]
#[inline(never)]
pub extern "C" fn trampoline(payload: Payload) {
    payload();
}

unsafe extern "C" {
    static __start_wxprobe_stub: u8;
    static __stop_wxprobe_stub: u8;
}

/// Byte range of the stub section as linked into this process.
#[derive(Debug, Clone, Copy)]
pub struct CodeCapsule {
    start: usize,
    stop: usize,
}

impl CodeCapsule {
    /// Resolves the section bounds of the running image.
    pub fn current() -> Self {
        let start = unsafe { &raw const __start_wxprobe_stub } as usize;
        let stop = unsafe { &raw const __stop_wxprobe_stub } as usize;

        // The section attribute must have taken effect; the trampoline's own
        // address has to fall inside the advertised range.
        let entry = trampoline as usize;
        assert!(
            start <= entry && entry < stop,
            "stub section bounds 0x{:x}..0x{:x} do not bracket the trampoline at 0x{:x}",
            start,
            stop,
            entry
        );

        Self { start, stop }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// The stub's machine code. Read-only view into the program's own text.
    pub fn bytes(&self) -> &'static [u8] {
        unsafe { slice::from_raw_parts(self.start as *const u8, self.len()) }
    }
}
