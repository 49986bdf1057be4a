//! Snapshot creation and publication.
//!
//! A [`CommitWriter`] writes a commit object for a reconciled tree and then
//! advances its history pointer with a compare-and-swap. The commit object is
//! written first: if the swap loses a race, the object stays in the store
//! unreferenced and the pointer is left exactly as the winner set it.
//!
//! The writer never retries. Callers that want to replay their edits onto
//! the new head do so themselves (see [`Shelf`](crate::Shelf)).

use gitshelf_git::{CasOutcome, CommitRecord, GitOid, ObjectStore, RefName, Signature, Timestamp};
use tracing::{info, warn};

use crate::config::Identity;
use crate::error::{Result, ShelfError};

/// Author, committer and message of a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Who made the change.
    pub author: Signature,
    /// Who recorded it.
    pub committer: Signature,
    /// Free-form message, stored verbatim.
    pub message: String,
}

impl Metadata {
    /// Metadata with `identity` as both author and committer, stamped now.
    #[must_use]
    pub fn now(identity: &Identity, message: impl Into<String>) -> Self {
        let signature = Signature {
            name: identity.name.clone(),
            email: identity.email.clone(),
            time: Timestamp::now(),
        };
        Self {
            author: signature.clone(),
            committer: signature,
            message: message.into(),
        }
    }
}

/// Writes snapshots and advances one history pointer.
#[derive(Debug)]
pub struct CommitWriter<'a, S: ?Sized> {
    store: &'a S,
    ref_name: RefName,
}

impl<'a, S: ObjectStore + ?Sized> CommitWriter<'a, S> {
    /// A writer publishing to `ref_name`.
    #[must_use]
    pub const fn new(store: &'a S, ref_name: RefName) -> Self {
        Self { store, ref_name }
    }

    /// The history pointer this writer advances.
    #[must_use]
    pub const fn ref_name(&self) -> &RefName {
        &self.ref_name
    }

    /// Record `tree` as a new snapshot and move the history pointer to it.
    ///
    /// `parents` are stored in the given order; pass the current head to keep
    /// lineage, several ids to record a merge, or none for a root snapshot.
    /// `expected` is the pointer value the caller last read (`None` when the
    /// pointer should not exist yet).
    ///
    /// # Errors
    /// [`ShelfError::ConcurrentUpdate`] if the pointer no longer equals
    /// `expected`; it carries the value actually found. Backend failures are
    /// returned as [`ShelfError::Backend`].
    pub fn commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        metadata: &Metadata,
        expected: Option<GitOid>,
    ) -> Result<GitOid> {
        let record = CommitRecord {
            tree,
            parents: parents.to_vec(),
            author: metadata.author.clone(),
            committer: metadata.committer.clone(),
            message: metadata.message.clone(),
        };
        let snapshot = self.store.write_commit(&record)?;

        match self
            .store
            .compare_and_swap_ref(&self.ref_name, expected, snapshot)?
        {
            CasOutcome::Updated => {
                info!(
                    ref_name = %self.ref_name,
                    %snapshot,
                    %tree,
                    parents = parents.len(),
                    "published snapshot"
                );
                Ok(snapshot)
            }
            CasOutcome::Conflict { actual } => {
                warn!(
                    ref_name = %self.ref_name,
                    expected = ?expected,
                    actual = ?actual,
                    orphaned = %snapshot,
                    "history pointer moved; snapshot not published"
                );
                Err(ShelfError::ConcurrentUpdate {
                    ref_name: self.ref_name.clone(),
                    actual,
                })
            }
        }
    }
}
