//! Error types for archive engine operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes of the engine, along with a convenient [`Result<T>`] type
//! alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. You can
//! handle errors using pattern matching or the `?` operator:
//!
//! ```rust,no_run
//! use packvault::{Error, Result};
//!
//! fn classify(error: &Error) {
//!     match error {
//!         Error::Io(e) => eprintln!("file error: {}", e),
//!         Error::Precondition(msg) => eprintln!("API misuse: {}", msg),
//!         Error::Adapter { context, .. } => eprintln!("adapter failed for {}", context),
//!         Error::RepackConsistency { reason } => eprintln!("repack aborted: {}", reason),
//!         _ => eprintln!("error: {}", error),
//!     }
//! }
//! ```
//!
//! Note that a thumbnail-cache miss is *not* an error: lookups return
//! [`Option`] and callers fall back to recomputing the preview.

use std::io;

/// The main error type for archive engine operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Programmer misuse | [`Precondition`][Self::Precondition] | Missing generator, invalid configuration |
/// | Collaborator | [`Adapter`][Self::Adapter], [`InvalidFormat`][Self::InvalidFormat] | A format adapter call failed |
/// | Repack | [`RepackConsistency`][Self::RepackConsistency] | Provider/entry mismatch, header serialization failure |
/// | Capability | [`NotSupported`][Self::NotSupported] | Generator cannot enumerate entries |
/// | Lifecycle | [`Cancelled`][Self::Cancelled], [`EntryNotFound`][Self::EntryNotFound] | Superseded refresh, unknown path |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A precondition of the API was violated.
    ///
    /// This indicates a programming error in the caller, not a recoverable
    /// I/O failure. The canonical example is requesting an entry's content
    /// with no staged replacement and no file generator supplied.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A format adapter call failed.
    ///
    /// Wraps the underlying cause together with the file (or operation) the
    /// adapter was working on. During browsing these are surfaced per entry
    /// so one corrupt file does not abort listing the rest of the archive.
    #[error("adapter failure for {context}: {source}")]
    Adapter {
        /// The entry path or operation the adapter was processing.
        context: String,
        /// The underlying adapter error.
        #[source]
        source: Box<Error>,
    },

    /// The archive bytes do not match the adapter's expected layout.
    ///
    /// Produced by adapters during [`FormatAdapter::load_archive`] when the
    /// container signature or index is malformed.
    ///
    /// [`FormatAdapter::load_archive`]: crate::adapter::FormatAdapter::load_archive
    #[error("invalid archive format: {0}")]
    InvalidFormat(String),

    /// The repack pipeline detected an internal inconsistency.
    ///
    /// This is fatal for the repack in progress: either the number of
    /// registered content providers did not match the entry count, a copied
    /// stream produced a different byte count than the entry's recorded
    /// size, or the adapter failed while serializing the finalized header.
    /// The in-memory entry set is left untouched and the repack can be
    /// retried without reloading.
    #[error("repack consistency failure: {reason}")]
    RepackConsistency {
        /// Description of the violated invariant.
        reason: String,
    },

    /// The requested capability is not supported by this collaborator.
    ///
    /// Returned for example by file generators that only support random
    /// access by entry and cannot report a total entry count.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The operation that is not supported.
        operation: &'static str,
    },

    /// The operation was cancelled before it started.
    ///
    /// Preview refreshes are cancelled cooperatively and report partial
    /// completion instead; this variant is reserved for operations that
    /// refuse to start under an already-cancelled token, such as a repack.
    #[error("operation cancelled")]
    Cancelled,

    /// No entry exists at the given archive path.
    #[error("entry not found: {path}")]
    EntryNotFound {
        /// The path that was not found.
        path: String,
    },
}

impl Error {
    /// Creates a [`Precondition`][Self::Precondition] error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    /// Creates an [`Adapter`][Self::Adapter] error wrapping `source` with
    /// the entry path or operation name it failed on.
    pub fn adapter(context: impl Into<String>, source: Error) -> Self {
        Error::Adapter {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a [`RepackConsistency`][Self::RepackConsistency] error.
    pub fn repack_consistency(reason: impl Into<String>) -> Self {
        Error::RepackConsistency {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates programmer misuse rather than
    /// a runtime failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// Returns `true` if this error originated in a format adapter.
    pub fn is_adapter_failure(&self) -> bool {
        matches!(self, Error::Adapter { .. } | Error::InvalidFormat(_))
    }

    /// Returns `true` if this error aborted a repack.
    ///
    /// Repack failures propagate to the caller unmodified; the engine makes
    /// no attempt to auto-retry or partially commit.
    pub fn is_repack_failure(&self) -> bool {
        matches!(self, Error::RepackConsistency { .. })
    }

    /// Returns the entry path associated with this error, if any.
    pub fn entry_path(&self) -> Option<&str> {
        match self {
            Error::Adapter { context, .. } => Some(context.as_str()),
            Error::EntryNotFound { path } => Some(path.as_str()),
            _ => None,
        }
    }
}

/// A specialized Result type for archive engine operations.
///
/// This is defined as `std::result::Result<T, Error>` for convenience.
pub type Result<T> = std::result::Result<T, Error>;
