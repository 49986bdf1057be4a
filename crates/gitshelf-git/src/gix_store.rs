//! The gix-backed implementation of [`ObjectStore`].

use std::path::Path;

use crate::error::GitError;
use crate::store::ObjectStore;
use crate::types::{CasOutcome, CommitRecord, GitOid, Object, RefName, TreeEntry};

/// An [`ObjectStore`] backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Only the object database and the ref store are used; there is no working
/// tree checkout and no index file. Construct via [`GixStore::open`],
/// [`GixStore::open_or_init`] or [`GixStore::init_bare`].
///
/// `gix::Repository` is not `Sync`; concurrent writers each open their own
/// `GixStore` on the same path and coordinate through
/// [`ObjectStore::compare_and_swap_ref`].
pub struct GixStore {
    pub(crate) repo: gix::Repository,
}

impl std::fmt::Debug for GixStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GixStore")
            .field("git_dir", &self.repo.git_dir())
            .finish()
    }
}

impl GixStore {
    /// Open the git repository at or above `path`.
    ///
    /// # Errors
    /// Returns [`GitError::BackendError`] if no repository can be opened.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open(path).map_err(|e| GitError::backend("open repository", e))?;
        tracing::debug!(git_dir = %repo.git_dir().display(), "opened object store");
        Ok(Self { repo })
    }

    /// Create a new bare repository at `path`.
    ///
    /// # Errors
    /// Returns [`GitError::BackendError`] if initialization fails (for
    /// example because a repository already exists there).
    pub fn init_bare(path: &Path) -> Result<Self, GitError> {
        let repo = gix::init_bare(path).map_err(|e| GitError::backend("init bare repository", e))?;
        tracing::info!(git_dir = %repo.git_dir().display(), "initialized bare object store");
        Ok(Self { repo })
    }

    /// Open the repository at `path`, creating a bare one if `path` does not
    /// exist yet.
    ///
    /// # Errors
    /// Returns [`GitError::IoError`] if the parent directory cannot be created,
    /// or [`GitError::BackendError`] if open/init fails.
    pub fn open_or_init(path: &Path) -> Result<Self, GitError> {
        if path.exists() {
            return Self::open(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init_bare(path)
    }

    /// The repository's git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.repo.git_dir()
    }
}

impl ObjectStore for GixStore {
    // === Object write ===
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_blob(self, data)
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_tree(self, entries)
    }

    fn write_commit(&self, commit: &CommitRecord) -> Result<GitOid, GitError> {
        crate::objects_impl::write_commit(self, commit)
    }

    // === Object read ===
    fn read_object(&self, oid: GitOid) -> Result<Object, GitError> {
        crate::objects_impl::read_object(self, oid)
    }

    fn has_object(&self, oid: GitOid) -> Result<bool, GitError> {
        Ok(crate::objects_impl::has_object(self, oid))
    }

    // === Refs ===
    fn resolve_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::resolve_ref(self, name)
    }

    fn compare_and_swap_ref(
        &self,
        name: &RefName,
        expected: Option<GitOid>,
        new: GitOid,
    ) -> Result<CasOutcome, GitError> {
        crate::refs_impl::compare_and_swap_ref(self, name, expected, new)
    }
}
