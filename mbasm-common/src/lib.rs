//! Multi-bank assembler - Common Types and Utilities
//!
//! This crate contains the types, error definitions and memory map
//! configuration shared by the data resolution core and its drivers.

pub mod error;
pub mod memory_map;
pub mod types;

pub use error::{DataError, DataResult, Diagnostic, ErrorReporter, Severity};
pub use memory_map::{MemoryMap, MAX_THREADS};
pub use types::*;
