pub mod alu;
pub mod cache;
pub mod cpu;
pub mod driver;
pub mod emulator;
pub mod instruction;
pub mod memory;
pub mod snapshot;

pub mod stages;

pub mod error;
