//! Error types for object backend operations.
//!
//! [`GitError`] is the single error type returned by all
//! [`ObjectStore`](crate::ObjectStore) methods. Compare-and-swap conflicts are
//! *not* errors at this layer: they come back as
//! [`CasOutcome::Conflict`](crate::CasOutcome::Conflict) so callers always see
//! the observed ref value.

use thiserror::Error;

use crate::types::GitOid;

/// Errors returned by [`ObjectStore`](crate::ObjectStore) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object or ref was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// A ref name failed validation.
    #[error("invalid ref name `{value}`: {reason}")]
    InvalidRefName {
        /// The rejected name.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An object exists but its bytes could not be decoded, or it is not the
    /// kind the caller asked for.
    #[error("corrupt object {oid}: {reason}")]
    Corrupt {
        /// The offending object.
        oid: GitOid,
        /// What was wrong with it.
        reason: String,
    },

    /// An I/O error occurred (file system, repository discovery, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The underlying backend (gix, in-memory store) returned an unclassified
    /// error.
    ///
    /// This is the catch-all for errors that don't fit other variants. The
    /// `message` should include enough context to diagnose the failure.
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl GitError {
    pub(crate) fn backend(context: &str, err: impl std::fmt::Display) -> Self {
        Self::BackendError {
            message: format!("{context}: {err}"),
        }
    }
}
