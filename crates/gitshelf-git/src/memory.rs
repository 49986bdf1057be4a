//! In-memory [`ObjectStore`].
//!
//! Objects are encoded through gix's object model and kept as loose-object
//! bodies keyed by the ids git would assign, so a tree built here hashes
//! identically to one built in a real repository. Clones share state: two clones behave like two processes
//! talking to the same object database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::object::{decode, encode, hash_object, to_gix_commit, to_gix_tree};
use crate::error::GitError;
use crate::store::ObjectStore;
use crate::types::{CasOutcome, CommitRecord, GitOid, Object, ObjectKind, RefName, TreeEntry};

#[derive(Default)]
struct Inner {
    objects: HashMap<GitOid, (ObjectKind, Vec<u8>)>,
    refs: BTreeMap<RefName, GitOid>,
    writes: usize,
}

/// `HashMap`-based object store for tests and embedding.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

fn poisoned<T>(_: T) -> GitError {
    GitError::BackendError {
        message: "memory store lock poisoned".to_owned(),
    }
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects stored.
    ///
    /// # Errors
    /// Returns [`GitError::BackendError`] if the lock is poisoned.
    pub fn object_count(&self) -> Result<usize, GitError> {
        Ok(self.inner.read().map_err(poisoned)?.objects.len())
    }

    /// Number of write calls that stored a new object.
    ///
    /// # Errors
    /// Returns [`GitError::BackendError`] if the lock is poisoned.
    pub fn write_count(&self) -> Result<usize, GitError> {
        Ok(self.inner.read().map_err(poisoned)?.writes)
    }

    fn put(&self, kind: ObjectKind, body: Vec<u8>) -> Result<GitOid, GitError> {
        let oid = hash_object(kind, &body)?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        if !inner.objects.contains_key(&oid) {
            inner.objects.insert(oid, (kind, body));
            inner.writes += 1;
        }
        Ok(oid)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("MemoryStore");
        if let Ok(inner) = self.inner.read() {
            s.field("object_count", &inner.objects.len())
                .field("ref_count", &inner.refs.len());
        }
        s.finish()
    }
}

impl ObjectStore for MemoryStore {
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError> {
        self.put(ObjectKind::Blob, data.to_vec())
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        self.put(ObjectKind::Tree, encode(&to_gix_tree(entries)?)?)
    }

    fn write_commit(&self, commit: &CommitRecord) -> Result<GitOid, GitError> {
        self.put(ObjectKind::Commit, encode(&to_gix_commit(commit))?)
    }

    fn read_object(&self, oid: GitOid) -> Result<Object, GitError> {
        let (kind, body) = self
            .inner
            .read()
            .map_err(poisoned)?
            .objects
            .get(&oid)
            .cloned()
            .ok_or_else(|| GitError::NotFound {
                message: format!("object {oid}"),
            })?;
        decode(oid, kind, body)
    }

    fn has_object(&self, oid: GitOid) -> Result<bool, GitError> {
        Ok(self.inner.read().map_err(poisoned)?.objects.contains_key(&oid))
    }

    fn resolve_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        Ok(self.inner.read().map_err(poisoned)?.refs.get(name).copied())
    }

    fn compare_and_swap_ref(
        &self,
        name: &RefName,
        expected: Option<GitOid>,
        new: GitOid,
    ) -> Result<CasOutcome, GitError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let actual = inner.refs.get(name).copied();
        if actual != expected {
            return Ok(CasOutcome::Conflict { actual });
        }
        inner.refs.insert(name.clone(), new);
        Ok(CasOutcome::Updated)
    }
}
