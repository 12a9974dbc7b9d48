//! W^X enforcement probe: plants a relocatable code stub in memory
//! obtained through six different acquisition paths and attempts to
//! execute it.

pub use capsule::{CodeCapsule, Payload, trampoline};
pub use error::{ProbeError, Result};
pub use page::PageGeometry;
pub use probe::run;
pub use region::{MemoryRegion, Mode, RegionKind};

mod capsule;
mod error;
mod invoke;
mod page;
mod probe;
mod protect;
mod region;
