//! Declared initial values and their normalization
//!
//! The front end hands over initializers in whatever shape it parsed them:
//! nothing, a single literal, or a list of literals. `normalize` decides the
//! shape once, so the rest of the core only ever sees a [`Value`].

use crate::literal::parse_int;
use mbasm_common::{DataError, DataResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An initializer exactly as the front end produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Str(String),
    List(Vec<RawValue>),
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Str(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Str(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(values: Vec<T>) -> Self {
        RawValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// One memory word of an initializer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Word {
    Int(i64),
    /// Text that is not an integer literal, resolved later by the back end
    Symbol(String),
    /// Declared without an initializer
    Unset,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Int(value) => write!(f, "{}", value),
            Word::Symbol(symbol) => write!(f, "{}", symbol),
            Word::Unset => write!(f, "?"),
        }
    }
}

/// A normalized initializer. Sequences always hold two or more words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Word),
    Sequence(Vec<Word>),
}

impl Value {
    pub fn int(value: i64) -> Self {
        Value::Scalar(Word::Int(value))
    }

    pub fn unset() -> Self {
        Value::Scalar(Word::Unset)
    }

    /// Build a value from its words, collapsing a single word to a scalar
    pub fn from_words(mut words: Vec<Word>) -> DataResult<Self> {
        match words.len() {
            0 => Err(DataError::malformed("value", "empty sequence")),
            1 => Ok(Value::Scalar(words.remove(0))),
            n => {
                sequence_len(n)?;
                Ok(Value::Sequence(words))
            }
        }
    }

    pub fn from_ints(values: &[i64]) -> DataResult<Self> {
        Self::from_words(values.iter().copied().map(Word::Int).collect())
    }

    /// Number of memory words the value occupies. Saturates, so an oversized
    /// sequence built by hand still fails every range check.
    pub fn len(&self) -> u32 {
        match self {
            Value::Scalar(_) => 1,
            Value::Sequence(words) => sequence_len(words.len()).unwrap_or(u32::MAX),
        }
    }

    pub fn words(&self) -> &[Word] {
        match self {
            Value::Scalar(word) => std::slice::from_ref(word),
            Value::Sequence(words) => words,
        }
    }

    /// True when every word was given, symbolic or not
    pub fn is_defined(&self) -> bool {
        self.words().iter().all(|word| *word != Word::Unset)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(word) => write!(f, "{}", word),
            Value::Sequence(words) => {
                let parts: Vec<String> = words.iter().map(|w| w.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

fn sequence_len(len: usize) -> DataResult<u32> {
    u32::try_from(len).map_err(|_| {
        DataError::malformed(
            "value",
            format!("sequence of {len} words does not fit the address space"),
        )
    })
}

/// Canonicalize a declared initializer
pub fn normalize(raw: Option<&RawValue>) -> DataResult<Value> {
    match raw {
        None => Ok(Value::unset()),
        Some(RawValue::List(items)) => {
            let words = items
                .iter()
                .map(literal_word)
                .collect::<DataResult<Vec<_>>>()?;
            Value::from_words(words)
        }
        Some(literal) => Ok(Value::Scalar(literal_word(literal)?)),
    }
}

fn literal_word(raw: &RawValue) -> DataResult<Word> {
    match raw {
        RawValue::Int(value) => Ok(Word::Int(*value)),
        RawValue::Str(text) => Ok(match parse_int(text) {
            Some(value) => Word::Int(value),
            None => Word::Symbol(text.trim().to_string()),
        }),
        RawValue::List(_) => Err(DataError::malformed(
            "value",
            "nested sequences are not supported",
        )),
    }
}
