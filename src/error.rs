//! Error types for shelf operations.
//!
//! [`ShelfError`] is returned by every namespace, reconcile, commit and read
//! operation. The variants are the core taxonomy callers are expected to
//! match on: not found, invalid path, concurrent update, backend failure.

use gitshelf_git::{GitError, GitOid, RefName};
use thiserror::Error;

use crate::config::ConfigError;
use crate::value::ValueError;

/// Errors returned by gitshelf operations.
#[derive(Debug, Error)]
pub enum ShelfError {
    /// A referenced path, object or history pointer does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// A path or entry name is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path, as given.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The history pointer moved since the caller last read it.
    ///
    /// Re-resolve against `actual`, re-apply the edit and retry; nothing was
    /// published under `ref_name` by the failed attempt.
    #[error("concurrent update of `{ref_name}`: now at {}", display_head(*actual))]
    ConcurrentUpdate {
        /// The pointer that could not be advanced.
        ref_name: RefName,
        /// The value observed instead of the expected one.
        actual: Option<GitOid>,
    },

    /// A stored tree contains an entry the shelf cannot represent (symlink,
    /// submodule).
    #[error("unsupported entry at {path:?}: {reason}")]
    Unsupported {
        /// Slash-delimited location of the entry.
        path: String,
        /// What kind of entry it is.
        reason: String,
    },

    /// A leaf's bytes could not be converted to or from a typed value.
    #[error("value at {path:?}: {source}")]
    Value {
        /// Slash-delimited location of the leaf.
        path: String,
        /// What the codec reported.
        #[source]
        source: ValueError,
    },

    /// A configuration file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The object backend failed. Not retried by the core.
    #[error(transparent)]
    Backend(GitError),
}

/// Result alias for shelf operations.
pub type Result<T, E = ShelfError> = std::result::Result<T, E>;

fn display_head(head: Option<GitOid>) -> String {
    head.map_or_else(|| "<absent>".to_owned(), |oid| oid.to_string())
}

impl ShelfError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

impl From<GitError> for ShelfError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::NotFound { message } => Self::NotFound { what: message },
            other => Self::Backend(other),
        }
    }
}

impl From<gitshelf_git::OidParseError> for ShelfError {
    fn from(e: gitshelf_git::OidParseError) -> Self {
        GitError::from(e).into()
    }
}

impl From<gitshelf_git::RefNameError> for ShelfError {
    fn from(e: gitshelf_git::RefNameError) -> Self {
        Self::InvalidPath {
            path: e.value,
            reason: e.reason,
        }
    }
}
