//! Error types for construction and for the public mutators.
//!
//! Validation errors never mutate state: every public entry point checks its
//! arguments before it ever reaches the mutex-guarded [`crate::state::ManagerState`].

use thiserror::Error;

/// Raised when [`crate::config::ManagerConfig`] fails validation at construction time.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid parameter `{name}`: {message}")]
pub struct ConfigError {
    pub name: &'static str,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }
}

/// Raised by a public mutator when its arguments are malformed.
///
/// Unknown ids are not an error (they are silently skipped, per spec); this
/// type only covers shape mismatches and out-of-range parameters that would
/// make the call ambiguous or violate a declared precondition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VoidError {
    #[error("{what}: expected {expected} entries, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("reinforce row {row}: ids and distances must align ({ids_len} vs {distances_len})")]
    RowLengthMismatch {
        row: usize,
        ids_len: usize,
        distances_len: usize,
    },
    #[error("degrade: ttl_floor must be >= 1, got {ttl_floor}")]
    InvalidTtlFloor { ttl_floor: i64 },
}

pub type Result<T> = std::result::Result<T, VoidError>;
