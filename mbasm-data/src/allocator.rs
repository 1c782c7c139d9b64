//! Bank-scoped bump allocation
//!
//! Shared and private variables are packed upwards from the floor of their
//! region. Rather than rescanning every bound entity, the allocator keeps a
//! cursor per (region, bank) holding the highest bound entity, updated on
//! every bind. The next free address is always that entity's address plus
//! its length, or the region floor while nothing is bound.
//!
//! Pointer slots get the same treatment with one counter per bank.

use log::trace;
use mbasm_common::{
    Address, AddressRange, Bank, DataError, DataResult, MemoryMap, PerBank, VariableKind,
};

/// The two regions addresses are bump-allocated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Shared,
    Private,
}

impl Region {
    pub fn kind(&self) -> VariableKind {
        match self {
            Region::Shared => VariableKind::Shared,
            Region::Private => VariableKind::Private,
        }
    }

    fn range(&self, memory_map: &MemoryMap) -> AddressRange {
        match self {
            Region::Shared => memory_map.shared,
            Region::Private => memory_map.private,
        }
    }

    /// Lowest address handed out when the bank holds nothing yet
    fn floor(&self, memory_map: &MemoryMap) -> Address {
        match self {
            Region::Shared => 0,
            Region::Private => memory_map.private.start,
        }
    }
}

/// Highest bound entity of a region in one bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    address: Address,
    len: u32,
}

impl Extent {
    fn end(&self) -> u64 {
        self.address as u64 + self.len as u64
    }
}

#[derive(Debug, Default)]
pub struct Allocator {
    shared: PerBank<Option<Extent>>,
    private: PerBank<Option<Extent>>,
    slots: PerBank<usize>,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor(&self, region: Region, bank: Bank) -> Option<Extent> {
        match region {
            Region::Shared => *self.shared.get(bank),
            Region::Private => *self.private.get(bank),
        }
    }

    fn cursor_mut(&mut self, region: Region, bank: Bank) -> &mut Option<Extent> {
        match region {
            Region::Shared => self.shared.get_mut(bank),
            Region::Private => self.private.get_mut(bank),
        }
    }

    /// Next free address of `region` in `bank`
    pub fn next_address(
        &self,
        region: Region,
        bank: Bank,
        memory_map: &MemoryMap,
    ) -> DataResult<Address> {
        let range = region.range(memory_map);
        let floor = region.floor(memory_map);
        let next = match self.cursor(region, bank) {
            Some(extent) => extent.end().max(floor as u64),
            None => floor as u64,
        };
        trace!("next {:?} address in bank {}: {}", region, bank, next);

        match Address::try_from(next) {
            Ok(address) if range.contains(address) => Ok(address),
            _ => Err(out_of_range(region, bank, next, range)),
        }
    }

    /// Check that `len` words starting at `address` all fit the region
    pub fn check_extent(
        &self,
        region: Region,
        bank: Bank,
        address: Address,
        len: u32,
        memory_map: &MemoryMap,
    ) -> DataResult<()> {
        let range = region.range(memory_map);
        let last = address as u64 + len.saturating_sub(1) as u64;
        if range.contains(address) && last < range.end as u64 {
            Ok(())
        } else {
            Err(out_of_range(region, bank, last, range))
        }
    }

    /// Move the cursor past a newly bound entity
    pub fn record(&mut self, region: Region, bank: Bank, address: Address, len: u32) {
        let cursor = self.cursor_mut(region, bank);
        if cursor.map_or(true, |extent| address > extent.address) {
            *cursor = Some(Extent { address, len });
            trace!("{:?} cursor in bank {} now at {}+{}", region, bank, address, len);
        }
    }

    /// Smallest slot no pointer in `bank` uses yet
    pub fn next_slot(&self, bank: Bank) -> usize {
        *self.slots.get(bank)
    }

    pub fn record_slot(&mut self, bank: Bank, slot: usize) {
        let next = self.slots.get_mut(bank);
        *next = (*next).max(slot + 1);
    }
}

fn out_of_range(region: Region, bank: Bank, address: u64, range: AddressRange) -> DataError {
    DataError::OutOfRange {
        kind: region.kind(),
        bank,
        address: Address::try_from(address).unwrap_or(Address::MAX),
        limit: range
            .last()
            .map(|last| last.to_string())
            .unwrap_or_else(|| "empty region".to_string()),
    }
}
