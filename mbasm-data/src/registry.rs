//! The variable registry
//!
//! Owns every entity declared during the front end's declaration pass, in
//! declaration order, together with the indexes the resolver needs: labels
//! to entities, anonymous constants per bank, and the allocation cursors.

use crate::allocator::{Allocator, Region};
use crate::entity::{Binding, Entity, EntityDetail, EntityId, PointerInfo};
use crate::literal::parse_int;
use crate::threads::ThreadSet;
use crate::value::{normalize, RawValue, Value};
use log::debug;
use mbasm_common::{Address, Bank, DataError, DataResult, MemoryMap, VariableKind};
use std::collections::HashMap;
use std::fmt;

/// All entities carrying one label. A label belongs to exactly one kind.
#[derive(Debug, Clone)]
pub(crate) struct LabelEntry {
    pub(crate) kind: VariableKind,
    pub(crate) ids: Vec<EntityId>,
}

/// Result of [`Registry::lookup_by_name`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatch {
    pub kind: VariableKind,
    pub ids: Vec<EntityId>,
}

pub struct Registry {
    pub(crate) memory_map: MemoryMap,
    pub(crate) entities: Vec<Entity>,
    pub(crate) labels: HashMap<String, LabelEntry>,
    /// Anonymous shared constants, keyed by the bank they live in. Constants
    /// are bound when created, so the index holds their binding.
    pub(crate) constants: HashMap<(Bank, Value), Binding>,
    pub(crate) allocator: Allocator,
    active_threads: ThreadSet,
}

impl Registry {
    /// Create a registry for one assembly run. Address 0 of each bank is
    /// taken by the zero constant before anything else is allocated.
    pub fn new(memory_map: MemoryMap) -> DataResult<Self> {
        memory_map.validate()?;
        let active_threads = ThreadSet::all(memory_map.thread_count);
        let mut registry = Self {
            memory_map,
            entities: Vec::new(),
            labels: HashMap::new(),
            constants: HashMap::new(),
            allocator: Allocator::new(),
            active_threads,
        };
        for bank in Bank::ALL {
            let id = registry.push(None, Value::int(0), EntityDetail::Shared);
            registry.bind(id, bank, 0);
            let binding = Binding {
                entity: id,
                address: 0,
                bank,
            };
            registry.constants.insert((bank, Value::int(0)), binding);
        }
        Ok(registry)
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }

    pub fn active_threads(&self) -> &ThreadSet {
        &self.active_threads
    }

    /// Select the threads subsequent private and pointer declarations replicate across
    pub fn set_active_threads<I, S>(&mut self, indices: I) -> DataResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let threads = ThreadSet::parse(indices, self.memory_map.thread_count)?;
        debug!("Active threads now {}", threads);
        self.active_threads = threads;
        Ok(())
    }

    /// Declare a private variable on every active thread, returning the first replica
    pub fn allocate_private(
        &mut self,
        label: &str,
        raw_value: Option<&RawValue>,
    ) -> DataResult<EntityId> {
        let threads = self.active_threads.clone();
        self.allocate_private_for(&threads, label, raw_value)
    }

    /// Declare a private variable on an explicit set of threads
    pub fn allocate_private_for(
        &mut self,
        threads: &ThreadSet,
        label: &str,
        raw_value: Option<&RawValue>,
    ) -> DataResult<EntityId> {
        let label = required_label(label, VariableKind::Private)?;
        threads.check(self.memory_map.thread_count)?;
        let value = normalize_for(label, raw_value)?;
        self.claim_label(label, VariableKind::Private)?;

        let ids: Vec<EntityId> = threads
            .iter()
            .map(|thread| {
                self.push(
                    Some(label.to_string()),
                    value.clone(),
                    EntityDetail::Private { thread },
                )
            })
            .collect();
        debug!("Declared private {} = {} on threads {}", label, value, threads);
        Ok(ids[0])
    }

    /// Declare a shared variable. Unlabelled shared variables are anonymous constants.
    pub fn allocate_shared(
        &mut self,
        label: Option<&str>,
        raw_value: Option<&RawValue>,
    ) -> DataResult<EntityId> {
        let label = label
            .map(|label| required_label(label, VariableKind::Shared))
            .transpose()?;
        let value = normalize_for(label.unwrap_or("anonymous constant"), raw_value)?;
        if let Some(label) = label {
            self.claim_label(label, VariableKind::Shared)?;
        }

        let id = self.push(label.map(str::to_string), value, EntityDetail::Shared);
        debug!("Declared shared {}", self.entities[id.0]);
        Ok(id)
    }

    /// Declare a pointer on every active thread, returning the first replica
    pub fn allocate_pointer(
        &mut self,
        label: &str,
        read_base: &str,
        read_incr: &str,
        write_base: &str,
        write_incr: &str,
    ) -> DataResult<EntityId> {
        let threads = self.active_threads.clone();
        self.allocate_pointer_for(&threads, label, read_base, read_incr, write_base, write_incr)
    }

    pub fn allocate_pointer_for(
        &mut self,
        threads: &ThreadSet,
        label: &str,
        read_base: &str,
        read_incr: &str,
        write_base: &str,
        write_incr: &str,
    ) -> DataResult<EntityId> {
        let label = required_label(label, VariableKind::Pointer)?;
        threads.check(self.memory_map.thread_count)?;
        let read_incr = integer_operand(label, "read increment", read_incr)?;
        let write_incr = integer_operand(label, "write increment", write_incr)?;
        self.claim_label(label, VariableKind::Pointer)?;

        let ids: Vec<EntityId> = threads
            .iter()
            .map(|thread| {
                let info = PointerInfo {
                    thread,
                    read_base: read_base.trim().to_string(),
                    read_incr,
                    write_base: write_base.trim().to_string(),
                    write_incr,
                    slot: None,
                    init_load: None,
                };
                self.push(Some(label.to_string()), Value::unset(), EntityDetail::Pointer(info))
            })
            .collect();
        debug!("Declared pointer {} on threads {}", label, threads);
        Ok(ids[0])
    }

    /// Declare an I/O port. Its bank is fixed here, not on first use.
    pub fn allocate_port(&mut self, label: &str, bank: Bank, number: &str) -> DataResult<EntityId> {
        let label = required_label(label, VariableKind::Port)?;
        let number = integer_operand(label, "port number", number)?;
        self.claim_label(label, VariableKind::Port)?;

        let id = self.push(Some(label.to_string()), Value::int(0), EntityDetail::Port { number });
        self.entities[id.0].bank = Some(bank);
        debug!("Declared port {} number {} in bank {}", label, number, bank);
        Ok(id)
    }

    /// Every entity carrying `label`, or `None` for an unknown label
    pub fn lookup_by_name(&self, label: &str) -> DataResult<Option<LabelMatch>> {
        let label = label.trim();
        let Some(entry) = self.labels.get(label) else {
            return Ok(None);
        };
        if let Some(stray) = entry
            .ids
            .iter()
            .map(|id| &self.entities[id.0])
            .find(|entity| entity.kind() != entry.kind)
        {
            return Err(DataError::duplicate(
                label,
                format!("used by both a {} and a {}", entry.kind, stray.kind()),
            ));
        }
        Ok(Some(LabelMatch {
            kind: entry.kind,
            ids: entry.ids.clone(),
        }))
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// All entities in declaration order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entities_of(&self, kind: VariableKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |entity| entity.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Record a pointer's initial load word once the back end has computed it
    pub fn set_init_load(&mut self, id: EntityId, word: i64) -> DataResult<()> {
        let entity = &mut self.entities[id.0];
        let label = entity.name().to_string();
        match &mut entity.detail {
            EntityDetail::Pointer(info) => match info.init_load {
                Some(previous) => Err(DataError::malformed(
                    format!("init load of pointer {label}"),
                    format!("already set to {previous}"),
                )),
                None => {
                    info.init_load = Some(word);
                    Ok(())
                }
            },
            _ => Err(DataError::malformed(
                format!("init load of {label}"),
                "only pointers carry an init load",
            )),
        }
    }

    pub(crate) fn push(
        &mut self,
        label: Option<String>,
        value: Value,
        detail: EntityDetail,
    ) -> EntityId {
        let id = EntityId(self.entities.len());
        let entity = Entity {
            id,
            label,
            value,
            address: None,
            bank: None,
            detail,
        };
        if let Some(label) = &entity.label {
            self.labels
                .entry(label.clone())
                .or_insert_with(|| LabelEntry {
                    kind: entity.kind(),
                    ids: Vec::new(),
                })
                .ids
                .push(id);
        }
        self.entities.push(entity);
        id
    }

    /// Check that `label` may be declared as `kind`. Private variables and
    /// pointers may repeat a label, one declaration per thread group; a
    /// shared variable or port label must be new.
    fn claim_label(&self, label: &str, kind: VariableKind) -> DataResult<()> {
        match self.labels.get(label) {
            None => Ok(()),
            Some(entry) if entry.kind != kind => Err(DataError::duplicate(
                label,
                format!("already in use by a {}, cannot declare a {}", entry.kind, kind),
            )),
            Some(_) if matches!(kind, VariableKind::Shared | VariableKind::Port) => {
                Err(DataError::duplicate(label, format!("{} declared twice", kind)))
            }
            Some(_) => Ok(()),
        }
    }

    /// Bind an unbound entity to `bank` and `address`, advancing the cursor
    /// of its region. Fields already set are left alone.
    pub(crate) fn bind(&mut self, id: EntityId, bank: Bank, address: Address) {
        let entity = &mut self.entities[id.0];
        let region = match entity.detail {
            EntityDetail::Shared => Some(Region::Shared),
            EntityDetail::Private { .. } => Some(Region::Private),
            EntityDetail::Pointer(_) | EntityDetail::Port { .. } => None,
        };
        if entity.bank.is_none() {
            entity.bank = Some(bank);
        }
        if entity.address.is_none() {
            entity.address = Some(address);
        }
        let len = entity.value.len();
        if let Some(region) = region {
            self.allocator.record(region, bank, address, len);
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data:")?;
        let sections = [
            ("Private Variables", VariableKind::Private),
            ("Shared Variables", VariableKind::Shared),
            ("Pointers", VariableKind::Pointer),
            ("Ports", VariableKind::Port),
        ];
        for (title, kind) in sections {
            writeln!(f, "\n{}:", title)?;
            for entity in self.entities_of(kind) {
                writeln!(f, "  {}", entity)?;
            }
        }
        Ok(())
    }
}

fn required_label(label: &str, kind: VariableKind) -> DataResult<&str> {
    let label = label.trim();
    if label.is_empty() {
        Err(DataError::malformed(format!("{} declaration", kind), "a label is required"))
    } else {
        Ok(label)
    }
}

fn normalize_for(label: &str, raw_value: Option<&RawValue>) -> DataResult<Value> {
    normalize(raw_value).map_err(|err| match err {
        DataError::MalformedValue { detail, .. } => DataError::MalformedValue {
            context: format!("initial value of {label}"),
            detail,
        },
        other => other,
    })
}

fn integer_operand(label: &str, what: &str, text: &str) -> DataResult<i64> {
    parse_int(text).ok_or_else(|| {
        DataError::malformed(
            format!("{what} of {label}"),
            format!("'{}' is not an integer literal", text.trim()),
        )
    })
}
