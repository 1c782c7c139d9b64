//! Common types used throughout the assembler
//!
//! This module defines the small value types shared by the data resolution
//! core and its drivers: banks, addresses, address ranges and the
//! kinds of variable a label can name.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Word address inside a data bank
pub type Address = u32;

/// Index of a hardware thread context
pub type ThreadId = usize;

/// One of the two parallel data memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bank {
    A,
    B,
}

impl Bank {
    pub const ALL: [Bank; 2] = [Bank::A, Bank::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bank::A => "A",
            Bank::B => "B",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Bank {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Bank::A),
            "B" => Ok(Bank::B),
            other => Err(DataError::MalformedValue {
                context: "bank".to_string(),
                detail: format!("'{other}' is not a data bank (expected A or B)"),
            }),
        }
    }
}

/// A pair of values, one per data bank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerBank<T> {
    #[serde(rename = "A")]
    pub a: T,
    #[serde(rename = "B")]
    pub b: T,
}

impl<T> PerBank<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, bank: Bank) -> &T {
        match bank {
            Bank::A => &self.a,
            Bank::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, bank: Bank) -> &mut T {
        match bank {
            Bank::A => &mut self.a,
            Bank::B => &mut self.b,
        }
    }
}

/// Half-open range of word addresses `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, address: Address) -> bool {
        self.start <= address && address < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Highest address inside the range, used when reporting limits
    pub fn last(&self) -> Option<Address> {
        if self.is_empty() {
            None
        } else {
            Some(self.end - 1)
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The collection a label belongs to. A label names exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Shared,
    Private,
    Pointer,
    Port,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Shared => write!(f, "shared variable"),
            VariableKind::Private => write!(f, "private variable"),
            VariableKind::Pointer => write!(f, "pointer"),
            VariableKind::Port => write!(f, "I/O port"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_parsing() {
        assert_eq!("A".parse::<Bank>().unwrap(), Bank::A);
        assert_eq!(" b ".parse::<Bank>().unwrap(), Bank::B);
        assert!(matches!(
            "C".parse::<Bank>(),
            Err(DataError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_per_bank_access() {
        let mut pair = PerBank::new(1, 2);
        assert_eq!(*pair.get(Bank::A), 1);
        *pair.get_mut(Bank::B) += 40;
        assert_eq!(pair.b, 42);
    }

    #[test]
    fn test_address_range() {
        let range = AddressRange::new(4, 8);
        assert!(range.contains(4));
        assert!(range.contains(7));
        assert!(!range.contains(8));
        assert_eq!(range.last(), Some(7));
        assert_eq!(AddressRange::new(3, 3).last(), None);
    }
}
