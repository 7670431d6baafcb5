use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Cache access error: {0}")]
    Cache(#[from] CacheError),

    #[error("Execution fault at PC={pc:#010x}: {source}")]
    Fault {
        pc: u32,
        #[source]
        source: CacheError,
    },

    #[error("Invalid argument: {0}")]
    Argument(String),
}

/// Errors related to snapshot files
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write snapshot '{0}': {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Snapshot truncated while reading {what} at offset {offset:#x}")]
    Truncated { what: &'static str, offset: usize },
}

/// Errors related to the backing store
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Address {address:#010x} is outside the 17-bit physical space")]
    OutOfRange { address: u32 },
}

/// Errors related to cache accesses
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Unsupported access size {size} at address {address:#010x}")]
    InvalidSize { address: u32, size: u32 },

    #[error("{size}-byte access at {address:#010x} straddles a cache line")]
    LineStraddle { address: u32, size: u32 },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
