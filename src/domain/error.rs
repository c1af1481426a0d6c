//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violated preconditions of the pipeline.
/// Internal invariant breaches are bugs and panic instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("at least one tag must be selected")]
    EmptySelection,

    #[error("record has an empty path")]
    EmptyPath,

    #[error("invalid column {column}: columns start at 1")]
    InvalidColumn { column: usize },

    #[error("invalid first data row {row}: rows start at 1")]
    InvalidRow { row: usize },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
