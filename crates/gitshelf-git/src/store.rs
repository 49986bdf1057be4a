//! The [`ObjectStore`] trait, the single abstraction boundary between the
//! shelf engine and the git object database.
//!
//! The shelf never touches gix directly; it programs against this trait. The
//! trait is object-safe so callers can use `&dyn ObjectStore`.
//!
//! | Group        | Methods                                                   |
//! |--------------|-----------------------------------------------------------|
//! | Object write | `write_blob`, `write_tree`, `write_commit`                |
//! | Object read  | `read_object`, `read_blob`, `read_tree`, `read_commit`    |
//! | Existence    | `has_object`                                              |
//! | Refs         | `resolve_ref`, `compare_and_swap_ref`                     |

use crate::error::GitError;
use crate::types::{CasOutcome, CommitRecord, GitOid, Object, RefName, TreeEntry};

/// Content-addressed object storage plus atomically updatable refs.
///
/// Implementations may be backed by gix ([`GixStore`](crate::GixStore)) or
/// held in memory ([`MemoryStore`](crate::MemoryStore)). Both produce the
/// same ids for the same content.
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return position
/// outside of `Result`. Callers may use `&dyn ObjectStore`.
pub trait ObjectStore {
    // -----------------------------------------------------------------------
    // Object write
    //
    // Replaces: git hash-object -w, git mktree, git commit-tree
    // -----------------------------------------------------------------------

    /// Write a blob and return its OID. Writing content that already exists
    /// is a no-op that returns the existing id.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    /// Write a tree object from a list of entries and return its OID.
    ///
    /// Entries are stored in canonical git order regardless of the order
    /// given, so identical listings always hash identically.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    /// Write a commit object and return its OID. No ref is touched.
    fn write_commit(&self, commit: &CommitRecord) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Object read
    //
    // Replaces: git cat-file
    // -----------------------------------------------------------------------

    /// Read and decode any object.
    ///
    /// Returns [`GitError::NotFound`] if the object does not exist.
    fn read_object(&self, oid: GitOid) -> Result<Object, GitError>;

    /// Return `true` if an object with this id is present.
    fn has_object(&self, oid: GitOid) -> Result<bool, GitError>;

    /// Read the contents of a blob object.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
        match self.read_object(oid)? {
            Object::Blob(data) => Ok(data),
            other => Err(kind_mismatch(oid, "blob", &other)),
        }
    }

    /// Read the entries of a tree object (one level deep, not recursive).
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        match self.read_object(oid)? {
            Object::Tree(entries) => Ok(entries),
            other => Err(kind_mismatch(oid, "tree", &other)),
        }
    }

    /// Read a commit object.
    fn read_commit(&self, oid: GitOid) -> Result<CommitRecord, GitError> {
        match self.read_object(oid)? {
            Object::Commit(record) => Ok(record),
            other => Err(kind_mismatch(oid, "commit", &other)),
        }
    }

    // -----------------------------------------------------------------------
    // Refs
    //
    // Replaces: git rev-parse <ref>, git update-ref <ref> <new> <old>
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    fn resolve_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Atomically point `name` at `new` if it currently holds `expected`.
    ///
    /// `expected = None` asserts that the ref does not exist yet. The check
    /// and the update are a single indivisible operation with respect to
    /// other writers of the same ref. A mismatch is reported as
    /// [`CasOutcome::Conflict`] carrying the observed value, never as an
    /// error.
    fn compare_and_swap_ref(
        &self,
        name: &RefName,
        expected: Option<GitOid>,
        new: GitOid,
    ) -> Result<CasOutcome, GitError>;
}

fn kind_mismatch(oid: GitOid, wanted: &str, found: &Object) -> GitError {
    GitError::Corrupt {
        oid,
        reason: format!("expected {wanted}, found {}", found.kind()),
    }
}
