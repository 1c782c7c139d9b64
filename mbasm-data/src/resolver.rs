//! Name resolution
//!
//! When an instruction references a name within a known bank, the resolver
//! binds the name to an address in that bank. Binding happens on first
//! touch and exactly once: later references in the same bank confirm it,
//! references from the other bank are conflicts. Private variables and
//! pointers carry one entity per thread, and every replica receives the
//! binding of the first.

use crate::allocator::Region;
use crate::entity::{Binding, EntityDetail, EntityId};
use crate::registry::Registry;
use log::{debug, trace};
use mbasm_common::{Address, Bank, DataError, DataResult, VariableKind};

impl Registry {
    /// Bind `name` to an address in `bank`, or confirm an existing binding
    pub fn resolve_named(&mut self, name: &str, bank: Bank) -> DataResult<Binding> {
        let name = name.trim();
        let found = self
            .lookup_by_name(name)?
            .ok_or_else(|| DataError::UnknownLabel {
                label: name.to_string(),
            })?;
        trace!("Resolving {} {} in bank {}", found.kind, name, bank);

        match found.kind {
            VariableKind::Shared => {
                let id = self.single(name, found.kind, &found.ids)?;
                self.check_bank(id, bank)?;
                self.place(id, Region::Shared, bank)
            }
            VariableKind::Private => {
                self.check_replicas(name, &found.ids)?;
                for &id in &found.ids {
                    self.check_bank(id, bank)?;
                }
                let binding = self.place(found.ids[0], Region::Private, bank)?;
                self.broadcast(&found.ids, binding.bank, binding.address, None);
                Ok(binding)
            }
            VariableKind::Port => {
                let id = self.single(name, found.kind, &found.ids)?;
                self.resolve_port(id, bank)
            }
            VariableKind::Pointer => {
                self.check_replicas(name, &found.ids)?;
                for &id in &found.ids {
                    self.check_bank(id, bank)?;
                }
                self.resolve_pointer(&found.ids, bank)
            }
        }
    }

    fn single(&self, name: &str, kind: VariableKind, ids: &[EntityId]) -> DataResult<EntityId> {
        match ids {
            [id] => Ok(*id),
            _ => Err(DataError::duplicate(
                name,
                format!("{} entities found for one {}", ids.len(), kind),
            )),
        }
    }

    /// First-touch rule: an entity already bound to the other bank conflicts
    fn check_bank(&self, id: EntityId, bank: Bank) -> DataResult<()> {
        let entity = self.get(id);
        match entity.bank {
            Some(was) if was != bank => Err(DataError::AddressConflict {
                label: entity.name().to_string(),
                kind: entity.kind(),
                was,
                now: bank,
            }),
            _ => Ok(()),
        }
    }

    /// Replicas of a private variable or pointer must sit on distinct
    /// threads and occupy the same number of words.
    fn check_replicas(&self, name: &str, ids: &[EntityId]) -> DataResult<()> {
        let first = self.get(ids[0]);
        for (i, &id) in ids.iter().enumerate() {
            let entity = self.get(id);
            if entity.value.len() != first.value.len() {
                return Err(DataError::duplicate(
                    name,
                    format!(
                        "redeclared with {} words on thread {:?}, first declared with {}",
                        entity.value.len(),
                        entity.thread(),
                        first.value.len()
                    ),
                ));
            }
            if ids[..i].iter().any(|&other| self.get(other).thread() == entity.thread()) {
                return Err(DataError::duplicate(
                    name,
                    format!("declared more than once on thread {:?}", entity.thread()),
                ));
            }
        }
        Ok(())
    }

    /// Allocate an address for an entity of a bump-allocated region if it
    /// has none yet, then bind it.
    fn place(&mut self, id: EntityId, region: Region, bank: Bank) -> DataResult<Binding> {
        let entity = self.get(id);
        let address = match entity.address {
            Some(address) => address,
            None => {
                let len = entity.value.len();
                let address = self.allocator.next_address(region, bank, &self.memory_map)?;
                self.allocator
                    .check_extent(region, bank, address, len, &self.memory_map)?;
                debug!("Allocated {} {} at {}:{}", region.kind(), entity.name(), bank, address);
                address
            }
        };
        self.bind(id, bank, address);
        Ok(Binding {
            entity: id,
            address,
            bank,
        })
    }

    fn resolve_port(&mut self, id: EntityId, bank: Bank) -> DataResult<Binding> {
        let entity = self.get(id);
        let EntityDetail::Port { number } = entity.detail else {
            return Err(DataError::duplicate(entity.name(), "port label names a non-port entity"));
        };
        // Ports are bound at declaration and only ever confirmed
        let declared = entity.bank.unwrap_or(bank);
        if declared != bank {
            return Err(DataError::AddressConflict {
                label: entity.name().to_string(),
                kind: VariableKind::Port,
                was: declared,
                now: bank,
            });
        }
        let address = match entity.address {
            Some(address) => address,
            None => {
                let address = self
                    .memory_map
                    .port_address(number)
                    .ok_or_else(|| DataError::OutOfRange {
                        kind: VariableKind::Port,
                        bank,
                        address: u32::try_from(number).unwrap_or(u32::MAX),
                        limit: format!("no I/O table entry for port {number}"),
                    })?;
                debug!("Port {} (number {}) at {}:{}", entity.name(), number, bank, address);
                address
            }
        };
        self.bind(id, bank, address);
        Ok(Binding {
            entity: id,
            address,
            bank,
        })
    }

    fn resolve_pointer(&mut self, ids: &[EntityId], bank: Bank) -> DataResult<Binding> {
        let first = self.get(ids[0]);
        let slot = match first.slot() {
            Some(slot) => slot,
            None => self.allocator.next_slot(bank),
        };
        let address = match first.address {
            Some(address) => address,
            None => self
                .memory_map
                .indirect_address(bank, slot)
                .ok_or_else(|| DataError::OutOfRange {
                    kind: VariableKind::Pointer,
                    bank,
                    address: u32::try_from(slot).unwrap_or(u32::MAX),
                    limit: format!("{} indirect slots", self.memory_map.slot_count(bank)),
                })?,
        };
        if first.slot().is_none() {
            debug!("Pointer {} takes slot {} at {}:{}", first.name(), slot, bank, address);
        }

        self.allocator.record_slot(bank, slot);
        self.broadcast(ids, bank, address, Some(slot));
        Ok(Binding {
            entity: ids[0],
            address,
            bank,
        })
    }

    /// Give every replica the binding of the first
    fn broadcast(&mut self, ids: &[EntityId], bank: Bank, address: Address, slot: Option<usize>) {
        for &id in ids {
            self.bind(id, bank, address);
            if let EntityDetail::Pointer(info) = &mut self.entities[id.index()].detail {
                if info.slot.is_none() {
                    info.slot = slot;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawValue;
    use mbasm_common::{AddressRange, MemoryMap, PerBank};
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::new(MemoryMap {
            thread_count: 4,
            shared: AddressRange::new(0, 32),
            private: AddressRange::new(32, 40),
            indirect: PerBank::new(vec![48, 49], vec![56, 57]),
            io: [(0x10, 60), (0x11, 61)].into_iter().collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_unknown_label() {
        let mut registry = registry();
        assert_eq!(
            registry.resolve_named("missing", Bank::A),
            Err(DataError::UnknownLabel {
                label: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_names_match_declarations_after_trimming() {
        let mut registry = registry();
        registry.allocate_shared(Some(" X"), Some(&RawValue::from(5i64))).unwrap();
        let padded = registry.resolve_named(" X", Bank::A).unwrap();
        assert_eq!(registry.resolve_named("X\t", Bank::A).unwrap(), padded);
        assert_eq!(registry.get(padded.entity).label.as_deref(), Some("X"));
        assert!(registry.lookup_by_name("  X ").unwrap().is_some());
    }

    #[test]
    fn test_shared_first_touch_then_confirm() {
        let mut registry = registry();
        registry
            .allocate_shared(Some("TABLE"), Some(&RawValue::from(vec![1i64, 2, 3])))
            .unwrap();
        registry.allocate_shared(Some("COUNT"), None).unwrap();

        let table = registry.resolve_named("TABLE", Bank::A).unwrap();
        let count = registry.resolve_named("COUNT", Bank::A).unwrap();
        assert_eq!((table.address, count.address), (1, 4));
        assert_eq!(registry.resolve_named("TABLE", Bank::A).unwrap(), table);

        let conflict = registry.resolve_named("TABLE", Bank::B);
        assert_eq!(
            conflict,
            Err(DataError::AddressConflict {
                label: "TABLE".to_string(),
                kind: VariableKind::Shared,
                was: Bank::A,
                now: Bank::B,
            })
        );
        assert_eq!(registry.get(table.entity).bank, Some(Bank::A));
    }

    #[test]
    fn test_shared_and_constants_share_the_bump() {
        let mut registry = registry();
        registry.allocate_shared(Some("X"), Some(&RawValue::from(5i64))).unwrap();
        let constant = registry
            .resolve_shared_value(&crate::value::Value::int(9), Bank::B)
            .unwrap();
        let x = registry.resolve_named("X", Bank::B).unwrap();
        assert_eq!((constant.address, x.address), (1, 2));
    }

    #[test]
    fn test_private_starts_at_region_floor() {
        let mut registry = registry();
        registry.set_active_threads(["0", "1"]).unwrap();
        registry.allocate_private("A1", Some(&RawValue::from(vec![1i64, 2]))).unwrap();
        registry.allocate_private("A2", None).unwrap();

        assert_eq!(registry.resolve_named("A1", Bank::A).unwrap().address, 32);
        assert_eq!(registry.resolve_named("A2", Bank::A).unwrap().address, 34);
        assert_eq!(registry.resolve_named("A2", Bank::A).unwrap().address, 34);
    }

    #[test]
    fn test_private_redeclared_for_more_threads() {
        let mut registry = registry();
        registry.set_active_threads(["0", "1"]).unwrap();
        registry.allocate_private("V", Some(&RawValue::from(1i64))).unwrap();
        let first = registry.resolve_named("V", Bank::B).unwrap();

        registry.set_active_threads(["2"]).unwrap();
        registry.allocate_private("V", Some(&RawValue::from(2i64))).unwrap();
        let again = registry.resolve_named("V", Bank::B).unwrap();
        assert_eq!(first, again);

        let bindings: Vec<_> = registry
            .entities_of(VariableKind::Private)
            .map(|e| (e.thread(), e.address, e.bank))
            .collect();
        assert_eq!(
            bindings,
            vec![
                (Some(0), Some(32), Some(Bank::B)),
                (Some(1), Some(32), Some(Bank::B)),
                (Some(2), Some(32), Some(Bank::B)),
            ]
        );
    }

    #[test]
    fn test_private_same_thread_twice_is_duplicate() {
        let mut registry = registry();
        registry.set_active_threads(["1"]).unwrap();
        registry.allocate_private("V", None).unwrap();
        registry.allocate_private("V", None).unwrap();
        assert!(matches!(
            registry.resolve_named("V", Bank::A),
            Err(DataError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn test_private_inconsistent_lengths() {
        let mut registry = registry();
        registry.set_active_threads(["0"]).unwrap();
        registry.allocate_private("V", Some(&RawValue::from(vec![1i64, 2]))).unwrap();
        registry.set_active_threads(["1"]).unwrap();
        registry.allocate_private("V", Some(&RawValue::from(1i64))).unwrap();
        assert!(matches!(
            registry.resolve_named("V", Bank::A),
            Err(DataError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn test_private_overflow() {
        let mut registry = registry();
        registry.set_active_threads(["0"]).unwrap();
        registry
            .allocate_private("BIG", Some(&RawValue::from(vec![0i64; 9])))
            .unwrap();
        assert!(matches!(
            registry.resolve_named("BIG", Bank::A),
            Err(DataError::OutOfRange {
                kind: VariableKind::Private,
                ..
            })
        ));
        // Nothing was bound by the failed attempt
        let big = registry.lookup_by_name("BIG").unwrap().unwrap().ids[0];
        assert!(!registry.get(big).is_bound());
    }

    #[test]
    fn test_port_confirms_declared_bank() {
        let mut registry = registry();
        registry.allocate_port("UART", Bank::A, "0x10").unwrap();
        let binding = registry.resolve_named("UART", Bank::A).unwrap();
        assert_eq!(binding.address, 60);
        assert!(matches!(
            registry.resolve_named("UART", Bank::B),
            Err(DataError::AddressConflict { .. })
        ));
    }

    #[test]
    fn test_port_missing_from_io_table() {
        let mut registry = registry();
        registry.allocate_port("GPIO", Bank::B, "3").unwrap();
        assert!(matches!(
            registry.resolve_named("GPIO", Bank::B),
            Err(DataError::OutOfRange {
                kind: VariableKind::Port,
                ..
            })
        ));
    }

    #[test]
    fn test_pointer_slots_per_bank() {
        let mut registry = registry();
        registry.set_active_threads(["0", "3"]).unwrap();
        registry.allocate_pointer("P1", "src", "1", "dst", "1").unwrap();
        registry.allocate_pointer("P2", "src", "2", "dst", "2").unwrap();
        registry.allocate_pointer("P3", "src", "1", "dst", "1").unwrap();

        let p1 = registry.resolve_named("P1", Bank::A).unwrap();
        let p3 = registry.resolve_named("P3", Bank::B).unwrap();
        let p2 = registry.resolve_named("P2", Bank::A).unwrap();
        assert_eq!((p1.address, p2.address, p3.address), (48, 49, 56));

        let p2_replicas: Vec<_> = registry
            .lookup_by_name("P2")
            .unwrap()
            .unwrap()
            .ids
            .iter()
            .map(|&id| (registry.get(id).slot(), registry.get(id).address, registry.get(id).bank))
            .collect();
        assert_eq!(
            p2_replicas,
            vec![(Some(1), Some(49), Some(Bank::A)), (Some(1), Some(49), Some(Bank::A))]
        );

        // Re-resolving keeps the slot
        assert_eq!(registry.resolve_named("P1", Bank::A).unwrap(), p1);
        assert!(matches!(
            registry.resolve_named("P1", Bank::B),
            Err(DataError::AddressConflict {
                kind: VariableKind::Pointer,
                ..
            })
        ));
    }

    #[test]
    fn test_pointer_slots_exhausted() {
        let mut registry = registry();
        registry.set_active_threads(["0"]).unwrap();
        for name in ["P1", "P2", "P3"] {
            registry.allocate_pointer(name, "a", "1", "b", "1").unwrap();
        }
        registry.resolve_named("P1", Bank::A).unwrap();
        registry.resolve_named("P2", Bank::A).unwrap();
        assert!(matches!(
            registry.resolve_named("P3", Bank::A),
            Err(DataError::OutOfRange { address: 2, .. })
        ));
        let p3 = registry.lookup_by_name("P3").unwrap().unwrap().ids[0];
        assert_eq!(registry.get(p3).slot(), None);
        assert_eq!(registry.resolve_named("P3", Bank::B).unwrap().address, 56);
    }
}
