//! Error types for Tally core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while the command-line front end uses `anyhow` for
//! convenient error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TallyError
pub type Result<T> = std::result::Result<T, TallyError>;

/// Core error types for Tally operations.
///
/// Every failure is reported to the caller that triggered it. Use
/// [`TallyError::kind`] to branch on the broad category.
#[derive(Error, Debug)]
pub enum TallyError {
    // === Query Errors ===
    /// The query text could not be parsed
    #[error("parse error at offset {position}: {reason}")]
    Parse { position: usize, reason: String },

    /// A term was rejected (empty terms cannot become word nodes)
    #[error("invalid term {term:?}: {reason}")]
    InvalidTerm { term: String, reason: String },

    /// An operator name that is not one of AND, OR, AND NOT
    #[error("invalid operator {operator:?}: expected one of AND, OR, AND NOT")]
    InvalidOperator { operator: String },

    /// An expansion path does not lead to a node of the tree
    #[error("invalid node path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    // === Ingestion Errors ===
    /// Every document id is taken
    #[error("index is full: no document id left after {documents} documents")]
    IndexFull { documents: u32 },

    // === Persistence Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The index file exists but is corrupted or structurally invalid
    #[error("index file is corrupted: {reason}")]
    Format { reason: String },

    /// The index file was written by an unsupported format version
    #[error("index version mismatch: found {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The index file does not exist
    #[error("index not found at {path}")]
    IndexNotFound { path: PathBuf },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Broad failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed query text
    Parse,
    /// File open, read or write failure
    Io,
    /// Corrupt or version-incompatible persisted data
    Format,
    /// Invalid arguments to an expansion or node constructor, or an
    /// ingestion the index has no room for
    Usage,
    /// Unreadable configuration
    Config,
}

impl TallyError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::Parse { .. } => ErrorKind::Parse,
            TallyError::Io(_) | TallyError::IndexNotFound { .. } => ErrorKind::Io,
            TallyError::Format { .. } | TallyError::UnsupportedVersion { .. } => {
                ErrorKind::Format
            }
            TallyError::InvalidTerm { .. }
            | TallyError::InvalidOperator { .. }
            | TallyError::InvalidPath { .. }
            | TallyError::IndexFull { .. } => ErrorKind::Usage,
            TallyError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns true if this error means the persisted index cannot be used
    /// and has to be rebuilt from the source documents.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            TallyError::IndexNotFound { .. }
                | TallyError::Format { .. }
                | TallyError::UnsupportedVersion { .. }
        )
    }

    /// Create a parse error
    pub fn parse(position: usize, reason: impl Into<String>) -> Self {
        TallyError::Parse {
            position,
            reason: reason.into(),
        }
    }

    /// Create a format error
    pub fn format(reason: impl Into<String>) -> Self {
        TallyError::Format {
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for TallyError {
    fn from(err: bincode::Error) -> Self {
        TallyError::Format {
            reason: err.to_string(),
        }
    }
}
