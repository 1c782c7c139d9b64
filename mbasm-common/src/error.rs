//! Error handling for the data resolution core
//!
//! This module defines the error taxonomy returned by every registry and
//! resolver operation, plus a reporter that lets a front end collect
//! several diagnostics from one pass before giving up.

use crate::types::{Address, Bank, VariableKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every failure the data core can report. None of them are recoverable
/// for the entity involved, but each leaves the registry unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Malformed {context}: {detail}")]
    MalformedValue { context: String, detail: String },

    #[error("Unknown label {label}")]
    UnknownLabel { label: String },

    #[error("Duplicate label {label}: {detail}")]
    DuplicateLabel { label: String, detail: String },

    #[error("Conflicting memory allocation for {kind} {label}. Was {was}, now {now}")]
    AddressConflict {
        label: String,
        kind: VariableKind,
        was: Bank,
        now: Bank,
    },

    #[error("Out of bounds address {address} for {kind} in bank {bank}. Limit is {limit}")]
    OutOfRange {
        kind: VariableKind,
        bank: Bank,
        address: Address,
        limit: String,
    },

    #[error("Invalid thread specification: {message}")]
    InvalidThreadSpec { message: String },

    #[error("Invalid memory map: {message}")]
    InvalidMemoryMap { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    pub fn malformed(context: impl Into<String>, detail: impl Into<String>) -> Self {
        DataError::MalformedValue {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn duplicate(label: impl Into<String>, detail: impl Into<String>) -> Self {
        DataError::DuplicateLabel {
            label: label.into(),
            detail: detail.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::IoError {
            message: err.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with severity and optional notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: String) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }
}

impl From<&DataError> for Diagnostic {
    fn from(err: &DataError) -> Self {
        Diagnostic::error(err.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;

        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }

        Ok(())
    }
}

/// Collects diagnostics so one pass can report every failure it hit
#[derive(Debug)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Record a failed operation, with a note saying where it happened
    pub fn report(&mut self, err: &DataError, note: Option<String>) {
        let mut diagnostic = Diagnostic::from(err);
        if let Some(note) = note {
            diagnostic = diagnostic.with_note(note);
        }
        self.push(diagnostic);
    }

    pub fn warning(&mut self, message: String) {
        self.push(Diagnostic::warning(message));
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Print all diagnostics to stderr
    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
