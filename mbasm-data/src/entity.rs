//! Entities tracked by the registry
//!
//! Every declared variable, pointer and port shares one base record
//! (label, value, address, bank). The kind-specific parts live in
//! [`EntityDetail`].

use crate::value::Value;
use mbasm_common::{Address, Bank, ThreadId, VariableKind};
use serde::Serialize;
use std::fmt;

/// Handle to an entity owned by a [`crate::Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub label: Option<String>,
    pub value: Value,
    pub address: Option<Address>,
    pub bank: Option<Bank>,
    #[serde(flatten)]
    pub detail: EntityDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityDetail {
    Shared,
    Private { thread: ThreadId },
    Pointer(PointerInfo),
    Port { number: i64 },
}

/// Indirect-addressing descriptor of one pointer replica
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerInfo {
    pub thread: ThreadId,
    pub read_base: String,
    pub read_incr: i64,
    pub write_base: String,
    pub write_incr: i64,
    /// Index into the bank's indirect table, assigned on first resolution
    pub slot: Option<usize>,
    /// Initial load word, filled in by the back end once bank and values are known
    pub init_load: Option<i64>,
}

impl Entity {
    pub fn kind(&self) -> VariableKind {
        match self.detail {
            EntityDetail::Shared => VariableKind::Shared,
            EntityDetail::Private { .. } => VariableKind::Private,
            EntityDetail::Pointer(_) => VariableKind::Pointer,
            EntityDetail::Port { .. } => VariableKind::Port,
        }
    }

    pub fn thread(&self) -> Option<ThreadId> {
        match &self.detail {
            EntityDetail::Private { thread } => Some(*thread),
            EntityDetail::Pointer(info) => Some(info.thread),
            EntityDetail::Shared | EntityDetail::Port { .. } => None,
        }
    }

    pub fn pointer(&self) -> Option<&PointerInfo> {
        match &self.detail {
            EntityDetail::Pointer(info) => Some(info),
            _ => None,
        }
    }

    pub fn slot(&self) -> Option<usize> {
        self.pointer().and_then(|info| info.slot)
    }

    pub fn is_bound(&self) -> bool {
        self.address.is_some() && self.bank.is_some()
    }

    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or("<anonymous>")
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name(), self.value)?;
        match (self.bank, self.address) {
            (Some(bank), Some(address)) => write!(f, " @ {}:{}", bank, address)?,
            (Some(bank), None) => write!(f, " @ {}:?", bank)?,
            (None, _) => write!(f, " @ unbound")?,
        }
        match &self.detail {
            EntityDetail::Shared => Ok(()),
            EntityDetail::Private { thread } => write!(f, " (thread {})", thread),
            EntityDetail::Pointer(info) => {
                write!(
                    f,
                    " (thread {}, read {}+{}, write {}+{}",
                    info.thread, info.read_base, info.read_incr, info.write_base, info.write_incr
                )?;
                if let Some(slot) = info.slot {
                    write!(f, ", slot {}", slot)?;
                }
                write!(f, ")")
            }
            EntityDetail::Port { number } => write!(f, " (port {})", number),
        }
    }
}

/// Result of a resolution: where the entity ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub entity: EntityId,
    pub address: Address,
    pub bank: Bank,
}
