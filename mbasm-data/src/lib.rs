//! Multi-bank assembler - Variable Registry and Address Resolution
//!
//! This crate takes the data declarations a front end emits (shared and
//! private variables, anonymous constants, indirect pointers and I/O ports)
//! and places each one at a conflict-free address once the bank it is used
//! from is known.
//!
//! Typical use:
//!
//! 1. Build a [`Registry`] from the target's [`mbasm_common::MemoryMap`].
//! 2. Declare entities with the `allocate_*` methods while parsing.
//! 3. Call [`Registry::resolve_named`] or [`Registry::resolve_shared_value`]
//!    whenever an instruction references a name or literal in a bank.

pub mod allocator;
pub mod dedup;
pub mod entity;
pub mod literal;
pub mod registry;
pub mod resolver;
pub mod threads;
pub mod value;

pub use allocator::{Allocator, Region};
pub use entity::{Binding, Entity, EntityDetail, EntityId, PointerInfo};
pub use literal::parse_int;
pub use registry::{LabelMatch, Registry};
pub use threads::ThreadSet;
pub use value::{normalize, RawValue, Value, Word};
