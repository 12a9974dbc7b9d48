use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("memfd_create failed: {0}")]
    MemfdCreate(Errno),

    #[error("write to memfd failed: {0}")]
    MemfdWrite(Errno),

    #[error("short write to memfd: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("mmap failed: {0}")]
    Mmap(Errno),

    #[error("aligned allocation failed: {0}")]
    Alloc(Errno),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
