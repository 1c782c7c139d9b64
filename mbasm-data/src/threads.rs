//! Thread sets used when declaring private variables and pointers

use crate::literal::parse_int;
use mbasm_common::{DataError, DataResult, ThreadId};
use std::fmt;

/// A validated, ordered, duplicate-free list of thread indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSet {
    threads: Vec<ThreadId>,
}

impl ThreadSet {
    /// Every thread of a processor with `thread_count` contexts
    pub fn all(thread_count: usize) -> Self {
        Self {
            threads: (0..thread_count).collect(),
        }
    }

    /// Parse thread indices written as integer literals
    pub fn parse<I, S>(indices: I, thread_count: usize) -> DataResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut threads = Vec::new();
        for index in indices {
            let text = index.as_ref();
            let thread = parse_int(text)
                .ok_or_else(|| invalid(format!("'{text}' is not an integer")))?;
            let thread = usize::try_from(thread)
                .ok()
                .filter(|&t| t < thread_count)
                .ok_or_else(|| {
                    invalid(format!(
                        "thread {thread} is out of range, valid threads are 0 to {}",
                        thread_count.saturating_sub(1)
                    ))
                })?;
            if threads.contains(&thread) {
                return Err(invalid(format!("thread {thread} listed more than once")));
            }
            threads.push(thread);
        }
        if threads.is_empty() {
            return Err(invalid("no threads given"));
        }
        Ok(Self { threads })
    }

    /// Check that every thread exists on a processor with `thread_count` contexts
    pub fn check(&self, thread_count: usize) -> DataResult<()> {
        match self.threads.iter().find(|&&t| t >= thread_count) {
            Some(t) => Err(invalid(format!(
                "thread {t} is out of range for {thread_count} threads"
            ))),
            None if self.threads.is_empty() => Err(invalid("no threads given")),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl fmt::Display for ThreadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.threads.iter().map(|t| t.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

fn invalid(message: impl Into<String>) -> DataError {
    DataError::InvalidThreadSpec {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threads() {
        let set = ThreadSet::parse(["0", "2", "0x7"], 8).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 2, 7]);
        assert_eq!(set.to_string(), "[0, 2, 7]");
    }

    #[test]
    fn test_rejects_bad_threads() {
        let out_of_range = ThreadSet::parse(["8"], 8);
        assert!(matches!(out_of_range, Err(DataError::InvalidThreadSpec { .. })));
        assert!(ThreadSet::parse(["-1"], 8).is_err());
        assert!(ThreadSet::parse(["1", "1"], 8).is_err());
        assert!(ThreadSet::parse(["one"], 8).is_err());
        assert!(ThreadSet::parse(Vec::<&str>::new(), 8).is_err());
    }

    #[test]
    fn test_check_against_thread_count() {
        let set = ThreadSet::all(4);
        assert_eq!(set.len(), 4);
        assert!(set.check(4).is_ok());
        assert!(set.check(2).is_err());
    }
}
