//! Static memory map of the target processor
//!
//! The map is produced outside the assembler core and consumed read-only:
//! it names the address ranges available to shared and private variables,
//! the slot table used by indirect pointers and the I/O port table.

use crate::error::{DataError, DataResult};
use crate::types::{Address, AddressRange, Bank, PerBank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest number of hardware thread contexts a map may declare
pub const MAX_THREADS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMap {
    /// Number of hardware thread contexts
    pub thread_count: usize,
    /// Region for shared variables and anonymous constants, starting at 0
    pub shared: AddressRange,
    /// Region for per-thread private variables
    pub private: AddressRange,
    /// Slot -> address of the indirect pointer registers, per bank
    pub indirect: PerBank<Vec<Address>>,
    /// Port number -> memory-mapped address
    #[serde(default)]
    pub io: BTreeMap<i64, Address>,
}

impl MemoryMap {
    /// Load and validate a memory map from a JSON file
    pub fn load(path: &Path) -> DataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> DataResult<Self> {
        let map: MemoryMap =
            serde_json::from_str(content).map_err(|e| DataError::InvalidMemoryMap {
                message: e.to_string(),
            })?;
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.thread_count == 0 {
            return Err(invalid("thread_count must be at least 1"));
        }
        if self.thread_count > MAX_THREADS {
            return Err(invalid(format!(
                "thread_count {} exceeds the maximum of {}",
                self.thread_count, MAX_THREADS
            )));
        }
        if self.shared.is_empty() {
            return Err(invalid(format!("empty shared range {}", self.shared)));
        }
        // The zero constant lives at address 0 of each bank
        if !self.shared.contains(0) {
            return Err(invalid(format!(
                "shared range {} must contain address 0",
                self.shared
            )));
        }
        if self.private.is_empty() {
            return Err(invalid(format!("empty private range {}", self.private)));
        }
        // Shared starts at 0, so any private range below its end overlaps it
        if self.private.start < self.shared.end {
            return Err(invalid(format!(
                "private range {} overlaps shared range {}",
                self.private, self.shared
            )));
        }
        Ok(())
    }

    pub fn indirect_address(&self, bank: Bank, slot: usize) -> Option<Address> {
        self.indirect.get(bank).get(slot).copied()
    }

    pub fn slot_count(&self, bank: Bank) -> usize {
        self.indirect.get(bank).len()
    }

    pub fn port_address(&self, number: i64) -> Option<Address> {
        self.io.get(&number).copied()
    }
}

fn invalid(message: impl Into<String>) -> DataError {
    DataError::InvalidMemoryMap {
        message: message.into(),
    }
}
