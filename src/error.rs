//! Error types for the coloring layer.
//!
//! All fallible operations in this crate return [`Result`]. The error kinds
//! mirror the failure classes of the index: malformed input, a serialized
//! archive holding a different color set representation than the caller
//! expected, violated structural invariants, exhausted resources during
//! construction, and plain API misuse.

use std::io;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors reported by the coloring layer.
#[derive(Error, Debug)]
pub enum ColoringError {
    /// Unreadable or inconsistent input: a truncated archive, an unknown
    /// variant tag, a color stream that does not match the sequence stream,
    /// or a k-mer that is missing from the index.
    #[error("malformed input: {0}")]
    InputMalformed(String),

    /// The archive tag disagrees with the color set representation the
    /// caller expected. This error is a catchable sentinel: callers that
    /// probe for a specific representation match on it and try the next one.
    #[error("wrong color set variant: expected {expected}, found {found}")]
    WrongVariant {
        /// Tag of the representation the caller asked for.
        expected: String,
        /// Tag found in the archive.
        found: String,
    },

    /// A structural invariant of the index does not hold: a dead end on a
    /// non-core k-mer chain, a non-monotone start offset array, or a rank
    /// query out of range. These indicate a construction bug or a corrupt
    /// archive and are not recoverable.
    #[error("structural invariant violated: {0}")]
    StructuralInvariant(String),

    /// Temporary file space or the memory budget ran out during
    /// construction. Partial outputs have been cleaned up.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// The caller broke an API contract, e.g. by passing a node identifier
    /// outside `[0, num_nodes)` or querying a storage that has not been
    /// frozen yet.
    #[error("usage error: {0}")]
    UsageError(String),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ColoringError>;

//-----------------------------------------------------------------------------

impl ColoringError {
    /// Wraps an I/O error from reading or writing an archive.
    pub fn archive_io(operation: &str, err: io::Error) -> Self {
        ColoringError::InputMalformed(format!("{}: {}", operation, err))
    }

    /// Wraps an I/O error from a temporary file used during construction.
    pub fn temp_io(operation: &str, err: io::Error) -> Self {
        ColoringError::ResourceExhaustion(format!("{}: {}", operation, err))
    }
}

//-----------------------------------------------------------------------------
