//! Anonymous constant deduplication
//!
//! Literal operands become anonymous shared variables. Equal values share
//! one entity per bank; the same value used from both banks gets one
//! entity in each.

use crate::allocator::Region;
use crate::entity::{Binding, EntityDetail};
use crate::registry::Registry;
use crate::value::Value;
use log::debug;
use mbasm_common::{Bank, DataError, DataResult};

impl Registry {
    /// Find or create the anonymous constant holding `value` in `bank`
    pub fn resolve_shared_value(&mut self, value: &Value, bank: Bank) -> DataResult<Binding> {
        if !value.is_defined() {
            return Err(DataError::malformed(
                "anonymous constant",
                format!("{value} has no value to place in bank {bank}"),
            ));
        }

        if let Some(&binding) = self.constants.get(&(bank, value.clone())) {
            debug!("Reusing constant {} at {}:{}", value, bank, binding.address);
            return Ok(binding);
        }

        let address = self.allocator.next_address(Region::Shared, bank, &self.memory_map)?;
        self.allocator
            .check_extent(Region::Shared, bank, address, value.len(), &self.memory_map)?;

        let id = self.push(None, value.clone(), EntityDetail::Shared);
        self.bind(id, bank, address);
        let binding = Binding {
            entity: id,
            address,
            bank,
        };
        self.constants.insert((bank, value.clone()), binding);
        debug!("Placed constant {} at {}:{}", value, bank, address);
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbasm_common::{AddressRange, MemoryMap, PerBank, VariableKind};
    use pretty_assertions::assert_eq;

    fn registry(shared_end: u32) -> Registry {
        Registry::new(MemoryMap {
            thread_count: 2,
            shared: AddressRange::new(0, shared_end),
            private: AddressRange::new(shared_end, shared_end + 16),
            indirect: PerBank::new(vec![100], vec![100]),
            io: Default::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_zero_is_the_preregistered_constant() {
        let mut registry = registry(16);
        let zero = registry.resolve_shared_value(&Value::int(0), Bank::B).unwrap();
        assert_eq!(zero.address, 0);
        assert_eq!(zero.entity, registry.entities().nth(1).unwrap().id);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sequence_follows_zero() {
        let mut registry = registry(16);
        let seq = Value::from_ints(&[5, 6]).unwrap();
        let binding = registry.resolve_shared_value(&seq, Bank::A).unwrap();
        assert_eq!(binding.address, 1);

        let next = registry.resolve_shared_value(&Value::int(7), Bank::A).unwrap();
        assert_eq!(next.address, 3);
    }

    #[test]
    fn test_constants_are_bank_scoped() {
        let mut registry = registry(16);
        let a = registry.resolve_shared_value(&Value::int(7), Bank::A).unwrap();
        let again = registry.resolve_shared_value(&Value::int(7), Bank::A).unwrap();
        let b = registry.resolve_shared_value(&Value::int(7), Bank::B).unwrap();

        assert_eq!(a, again);
        assert_ne!(a.entity, b.entity);
        assert_eq!((a.address, b.address), (1, 1));
        assert_eq!(registry.entities_of(VariableKind::Shared).count(), 4);
    }

    #[test]
    fn test_symbolic_constants_dedup_by_token() {
        let mut registry = registry(16);
        let sym = crate::value::normalize(Some(&"END".into())).unwrap();
        let first = registry.resolve_shared_value(&sym, Bank::A).unwrap();
        let second = registry.resolve_shared_value(&sym, Bank::A).unwrap();
        assert_eq!(first.entity, second.entity);
    }

    #[test]
    fn test_unset_value_rejected() {
        let mut registry = registry(16);
        assert!(matches!(
            registry.resolve_shared_value(&Value::unset(), Bank::A),
            Err(DataError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_shared_overflow() {
        let mut full = registry(3);
        full.resolve_shared_value(&Value::int(1), Bank::A).unwrap();
        full.resolve_shared_value(&Value::int(2), Bank::A).unwrap();
        assert!(matches!(
            full.resolve_shared_value(&Value::int(3), Bank::A),
            Err(DataError::OutOfRange { address: 3, .. })
        ));
        assert_eq!(full.len(), 4);

        // A sequence that starts inside the region but runs off its end
        let mut short = registry(3);
        assert!(matches!(
            short.resolve_shared_value(&Value::from_ints(&[1, 2, 3]).unwrap(), Bank::A),
            Err(DataError::OutOfRange { address: 3, .. })
        ));
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn test_failed_constant_is_not_indexed() {
        let mut full = registry(2);
        let one = full.resolve_shared_value(&Value::int(1), Bank::A).unwrap();
        assert!(full.resolve_shared_value(&Value::int(2), Bank::A).is_err());
        assert_eq!(full.constants.len(), 3);

        // Hits come straight from the index without touching the allocator
        assert_eq!(full.resolve_shared_value(&Value::int(1), Bank::A), Ok(one));
        assert!(full.resolve_shared_value(&Value::int(2), Bank::A).is_err());
        assert_eq!(full.len(), 3);
    }
}
