//! A read-write session over one history pointer.
//!
//! [`Shelf`] ties the pieces together: it loads the namespace of the current
//! head, applies edits to it, and on [`Shelf::commit`] reconciles the
//! namespace and publishes a snapshot through a [`CommitWriter`].
//!
//! # Conflicts
//!
//! Publication is a compare-and-swap against the head the session last saw.
//! With [`ConflictPolicy::Fail`] a lost race surfaces as
//! [`ShelfError::ConcurrentUpdate`] and the session keeps its edits. With
//! [`ConflictPolicy::Replay`] the session records every edit, reloads the new
//! head, re-applies the edits on top and tries again, up to
//! `commit.max_retries` times.

use std::io;
use std::path::Path;

use gitshelf_git::{CommitRecord, GitOid, GixStore, ObjectStore, RefName};
use tracing::{debug, info, warn};

use crate::commit::{CommitWriter, Metadata};
use crate::config::{ConflictPolicy, ShelfConfig};
use crate::error::{Result, ShelfError};
use crate::path::ShelfPath;
use crate::reader::{Revision, SnapshotReader};
use crate::reconcile::reconcile;
use crate::tree::{EntryKind, Namespace};
use crate::value::ValueCodec;

/// A recorded mutation, replayed onto a new head after a lost race.
#[derive(Clone, Debug)]
enum Edit {
    Set { path: ShelfPath, data: Vec<u8> },
    SetBlob { path: ShelfPath, oid: GitOid },
    SetExecutable { path: ShelfPath, executable: bool },
    Delete { path: ShelfPath },
}

impl Edit {
    /// Edits that are moot once the target is gone.
    const fn tolerates_missing(&self) -> bool {
        matches!(self, Self::SetExecutable { .. } | Self::Delete { .. })
    }

    fn apply<S: ObjectStore>(&self, store: &S, namespace: &mut Namespace) -> Result<()> {
        match self {
            Self::Set { path, data } => namespace.set(store, path, data.clone()),
            Self::SetBlob { path, oid } => namespace.set_blob(store, path, *oid, false),
            Self::SetExecutable { path, executable } => {
                namespace.set_executable(store, path, *executable)
            }
            Self::Delete { path } => namespace.delete(store, path),
        }
    }
}

/// A session over a namespace published under one history pointer.
#[derive(Debug)]
pub struct Shelf<S> {
    store: S,
    config: ShelfConfig,
    ref_name: RefName,
    head: Option<GitOid>,
    base_tree: Option<GitOid>,
    namespace: Namespace,
    journal: Vec<Edit>,
}

impl Shelf<GixStore> {
    /// Open a shelf in the git repository at `path`, creating a bare
    /// repository there if none exists.
    ///
    /// # Errors
    /// Returns [`ShelfError::Backend`] if the repository cannot be opened or
    /// created, or any error from [`Shelf::open`].
    pub fn open_repository(path: &Path, config: ShelfConfig) -> Result<Self> {
        let store = GixStore::open_or_init(path)?;
        Self::open(store, config)
    }
}

impl<S: ObjectStore> Shelf<S> {
    /// Open a session on the branch named by `config.shelf.branch`.
    ///
    /// A branch that does not exist yet gives an empty namespace; the first
    /// commit creates it.
    ///
    /// # Errors
    /// [`ShelfError::InvalidPath`] for an invalid branch name, or a backend
    /// error if the head snapshot cannot be read.
    pub fn open(store: S, config: ShelfConfig) -> Result<Self> {
        let ref_name = pointer_name(&config.shelf.branch)?;
        let head = store.resolve_ref(&ref_name)?;
        let mut shelf = Self {
            store,
            config,
            ref_name,
            head: None,
            base_tree: None,
            namespace: Namespace::new(),
            journal: Vec::new(),
        };
        shelf.load(head)?;
        info!(ref_name = %shelf.ref_name, head = ?shelf.head, "opened shelf");
        Ok(shelf)
    }

    fn load(&mut self, head: Option<GitOid>) -> Result<()> {
        let base_tree = self.tree_of(head)?;
        self.head = head;
        self.base_tree = base_tree;
        self.namespace = base_tree.map_or_else(Namespace::new, Namespace::from_tree);
        Ok(())
    }

    fn tree_of(&self, head: Option<GitOid>) -> Result<Option<GitOid>> {
        match head {
            Some(id) => Ok(Some(self.store.read_commit(id)?.tree)),
            None => Ok(None),
        }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The configuration this session was opened with.
    #[must_use]
    pub const fn config(&self) -> &ShelfConfig {
        &self.config
    }

    /// The history pointer this session publishes to.
    #[must_use]
    pub const fn ref_name(&self) -> &RefName {
        &self.ref_name
    }

    /// The snapshot this session is based on, if the pointer existed.
    #[must_use]
    pub const fn head(&self) -> Option<GitOid> {
        self.head
    }

    /// True if there are edits not yet published.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.namespace.is_dirty() || self.namespace.origin() != self.base_tree
    }

    const fn records_edits(&self) -> bool {
        matches!(self.config.commit.on_conflict, ConflictPolicy::Replay)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The bytes stored at `path`.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there.
    pub fn get(&mut self, path: &str) -> Result<&[u8]> {
        let path = ShelfPath::parse(path)?;
        self.namespace.get(&self.store, &path)
    }

    /// True if a leaf exists at `path`.
    ///
    /// # Errors
    /// [`ShelfError::InvalidPath`] for a malformed path, or a backend error.
    pub fn contains(&mut self, path: &str) -> Result<bool> {
        let path = ShelfPath::parse(path)?;
        self.namespace.contains(&self.store, &path)
    }

    /// What lives at `path`, if anything.
    ///
    /// # Errors
    /// [`ShelfError::InvalidPath`] for a malformed path, or a backend error.
    pub fn kind(&mut self, path: &str) -> Result<Option<EntryKind>> {
        let path = ShelfPath::parse(path)?;
        self.namespace.kind(&self.store, &path)
    }

    /// Whether the leaf at `path` is marked executable.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there.
    pub fn is_executable(&mut self, path: &str) -> Result<bool> {
        let path = ShelfPath::parse(path)?;
        self.namespace.is_executable(&self.store, &path)
    }

    /// Child names of the namespace at `path`; `""` lists the root.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if `path` is not a namespace.
    pub fn list(&mut self, path: &str) -> Result<Vec<String>> {
        if path.is_empty() {
            return self.namespace.list(&self.store, None);
        }
        let path = ShelfPath::parse(path)?;
        self.namespace.list(&self.store, Some(&path))
    }

    /// Every leaf path in name order.
    ///
    /// # Errors
    /// Returns a backend error if loading fails.
    pub fn keys(&mut self) -> Result<Vec<String>> {
        self.namespace.keys(&self.store)
    }

    /// Every leaf path with its bytes, in name order.
    ///
    /// # Errors
    /// Returns a backend error if loading fails.
    pub fn items(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let keys = self.namespace.keys(&self.store)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let data = self
                .namespace
                .get(&self.store, &ShelfPath::parse(&key)?)?
                .to_vec();
            out.push((key, data));
        }
        Ok(out)
    }

    /// Number of leaves.
    ///
    /// # Errors
    /// Returns a backend error if loading fails.
    pub fn len(&mut self) -> Result<usize> {
        self.namespace.len(&self.store)
    }

    /// True if the shelf holds no leaves.
    ///
    /// # Errors
    /// Returns a backend error if loading fails.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.namespace.list(&self.store, None)?.is_empty())
    }

    /// Read bytes stored by [`Shelf::put`].
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if nothing was put under `id`, or a backend
    /// error if `id` is not a valid object id.
    pub fn get_by_id(&mut self, id: &str) -> Result<&[u8]> {
        let oid: GitOid = id.parse()?;
        self.namespace.get(&self.store, &content_path(oid)?)
    }

    /// Decode the leaf at `path` with `codec`.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there, or
    /// [`ShelfError::Value`] if its bytes do not decode.
    pub fn get_as<C: ValueCodec>(&mut self, codec: &C, path: &str) -> Result<C::Value> {
        let bytes = self.get(path)?;
        codec.decode(bytes).map_err(|source| ShelfError::Value {
            path: path.to_owned(),
            source,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Store `data` at `path`.
    ///
    /// # Errors
    /// [`ShelfError::InvalidPath`] for a malformed path, or a backend error.
    pub fn set(&mut self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = ShelfPath::parse(path)?;
        let data = data.into();
        if self.records_edits() {
            self.namespace.set(&self.store, &path, data.clone())?;
            self.journal.push(Edit::Set { path, data });
        } else {
            self.namespace.set(&self.store, &path, data)?;
        }
        Ok(())
    }

    /// Encode `value` with `codec` and store it at `path`.
    ///
    /// # Errors
    /// [`ShelfError::Value`] if the value does not encode, otherwise as for
    /// [`Shelf::set`].
    pub fn set_as<C: ValueCodec>(&mut self, codec: &C, path: &str, value: &C::Value) -> Result<()> {
        let data = codec.encode(value).map_err(|source| ShelfError::Value {
            path: path.to_owned(),
            source,
        })?;
        self.set(path, data)
    }

    /// A view of this session that reads and writes values through `codec`.
    #[must_use]
    pub const fn book<C: ValueCodec>(&mut self, codec: C) -> Book<'_, S, C> {
        Book { shelf: self, codec }
    }

    /// Mark the leaf at `path` executable or not.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there.
    pub fn set_executable(&mut self, path: &str, executable: bool) -> Result<()> {
        let path = ShelfPath::parse(path)?;
        self.namespace.set_executable(&self.store, &path, executable)?;
        if self.records_edits() {
            self.journal.push(Edit::SetExecutable { path, executable });
        }
        Ok(())
    }

    /// Remove the entry at `path`, pruning namespaces left empty.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if nothing exists there.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let path = ShelfPath::parse(path)?;
        self.namespace.delete(&self.store, &path)?;
        if self.records_edits() {
            self.journal.push(Edit::Delete { path });
        }
        Ok(())
    }

    /// Store `data` under its own content id and return that id.
    ///
    /// The blob is written immediately and placed at `ab/cdef...`, where
    /// `abcdef...` is the hex id.
    ///
    /// # Errors
    /// Returns a backend error if the write fails.
    pub fn put(&mut self, data: &[u8]) -> Result<GitOid> {
        let oid = self.store.write_blob(data)?;
        let path = content_path(oid)?;
        self.namespace.set_blob(&self.store, &path, oid, false)?;
        if self.records_edits() {
            self.journal.push(Edit::SetBlob { path, oid });
        }
        Ok(oid)
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    /// Publish pending edits as a new snapshot.
    ///
    /// Returns the new head, or the current head without writing anything
    /// when there is nothing to publish (`None` if the pointer has never
    /// been written).
    ///
    /// # Errors
    /// [`ShelfError::ConcurrentUpdate`] if another writer advanced the
    /// pointer and the conflict policy gave up. The session keeps its edits.
    pub fn commit(&mut self, message: &str) -> Result<Option<GitOid>> {
        if !self.is_dirty() {
            debug!(ref_name = %self.ref_name, "nothing to commit");
            return Ok(self.head);
        }
        let mut replays = 0;
        loop {
            match self.publish(message) {
                Err(ShelfError::ConcurrentUpdate { actual, .. })
                    if self.records_edits() && replays < self.config.commit.max_retries =>
                {
                    replays += 1;
                    warn!(
                        ref_name = %self.ref_name,
                        attempt = replays,
                        edits = self.journal.len(),
                        "replaying edits onto new head"
                    );
                    self.replay(actual)?;
                }
                other => return other.map(Some),
            }
        }
    }

    fn publish(&mut self, message: &str) -> Result<GitOid> {
        let reconciled = reconcile(&self.store, &mut self.namespace, self.base_tree)?;
        if let Some(head) = self.head
            && !reconciled.changed_from(self.base_tree)
        {
            debug!(ref_name = %self.ref_name, "edits cancel out; head unchanged");
            self.journal.clear();
            return Ok(head);
        }

        let parents: Vec<GitOid> = if self.config.shelf.keep_history {
            self.head.into_iter().collect()
        } else {
            Vec::new()
        };
        let metadata = Metadata::now(&self.config.identity, message);
        let snapshot = CommitWriter::new(&self.store, self.ref_name.clone()).commit(
            reconciled.tree,
            &parents,
            &metadata,
            self.head,
        )?;

        self.head = Some(snapshot);
        self.base_tree = Some(reconciled.tree);
        self.journal.clear();
        Ok(snapshot)
    }

    /// Rebuild the session on `head` with the journal re-applied.
    ///
    /// The session is only switched over once every edit has applied; on
    /// error it stays on its old base with its edits and journal intact.
    fn replay(&mut self, head: Option<GitOid>) -> Result<()> {
        let base_tree = self.tree_of(head)?;
        let mut namespace = base_tree.map_or_else(Namespace::new, Namespace::from_tree);
        for edit in &self.journal {
            match edit.apply(&self.store, &mut namespace) {
                Err(ShelfError::NotFound { what }) if edit.tolerates_missing() => {
                    debug!(%what, "skipping edit whose target is gone");
                }
                other => other?,
            }
        }
        self.head = head;
        self.base_tree = base_tree;
        self.namespace = namespace;
        Ok(())
    }

    /// Publish pending edits with an empty message.
    ///
    /// # Errors
    /// As for [`Shelf::commit`].
    pub fn sync(&mut self) -> Result<()> {
        self.commit("").map(|_| ())
    }

    /// Publish pending edits and end the session, returning the final head.
    ///
    /// # Errors
    /// As for [`Shelf::commit`]. The session is consumed either way.
    pub fn close(mut self) -> Result<Option<GitOid>> {
        self.commit("")
    }

    /// Pick up snapshots published by other writers.
    ///
    /// Returns `false` if the pointer has not moved. With pending edits, the
    /// replay policy re-applies them onto the new head.
    ///
    /// # Errors
    /// [`ShelfError::ConcurrentUpdate`] if the pointer moved while edits are
    /// pending and the policy is `fail`. Call [`Shelf::discard`] first to
    /// drop them.
    pub fn refresh(&mut self) -> Result<bool> {
        let current = self.store.resolve_ref(&self.ref_name)?;
        if current == self.head {
            return Ok(false);
        }
        if self.is_dirty() {
            if !self.records_edits() {
                return Err(ShelfError::ConcurrentUpdate {
                    ref_name: self.ref_name.clone(),
                    actual: current,
                });
            }
            self.replay(current)?;
        } else {
            self.load(current)?;
        }
        debug!(ref_name = %self.ref_name, head = ?self.head, "refreshed shelf");
        Ok(true)
    }

    /// Drop pending edits and return to the session's head.
    ///
    /// # Errors
    /// Returns a backend error if the head snapshot cannot be read.
    pub fn discard(&mut self) -> Result<()> {
        self.journal.clear();
        self.load(self.head)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Parents of the head snapshot.
    ///
    /// # Errors
    /// Returns a backend error if the head cannot be read.
    pub fn parent_ids(&self) -> Result<Vec<GitOid>> {
        match self.head {
            Some(head) => Ok(self.store.read_commit(head)?.parents),
            None => Ok(Vec::new()),
        }
    }

    /// First-parent history from the head, newest first.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if an ancestor is missing.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<(GitOid, CommitRecord)>> {
        match self.head {
            Some(head) => {
                SnapshotReader::new(&self.store).history(&Revision::Snapshot(head), limit)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Write a listing of the loaded part of the namespace to `out`.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.namespace.dump(out)
    }
}

fn pointer_name(branch: &str) -> Result<RefName> {
    if branch == "HEAD" || branch.starts_with("refs/") {
        Ok(RefName::new(branch)?)
    } else {
        Ok(RefName::branch(branch)?)
    }
}

fn content_path(oid: GitOid) -> Result<ShelfPath> {
    let hex = oid.to_string();
    let (dir, rest) = hex.split_at(2);
    ShelfPath::from_components([dir, rest])
}

/// A [`Shelf`] seen through one [`ValueCodec`].
///
/// Edits made through a book are ordinary shelf edits: they are journaled,
/// replayed and published like any other.
#[derive(Debug)]
pub struct Book<'a, S, C> {
    shelf: &'a mut Shelf<S>,
    codec: C,
}

impl<S: ObjectStore, C: ValueCodec> Book<'_, S, C> {
    /// The value stored at `path`.
    ///
    /// # Errors
    /// As for [`Shelf::get_as`].
    pub fn get(&mut self, path: &str) -> Result<C::Value> {
        self.shelf.get_as(&self.codec, path)
    }

    /// Store `value` at `path`.
    ///
    /// # Errors
    /// As for [`Shelf::set_as`].
    pub fn set(&mut self, path: &str, value: &C::Value) -> Result<()> {
        self.shelf.set_as(&self.codec, path, value)
    }

    /// Every leaf with its decoded value, in name order.
    ///
    /// # Errors
    /// [`ShelfError::Value`] naming the first leaf that does not decode.
    pub fn items(&mut self) -> Result<Vec<(String, C::Value)>> {
        let keys = self.shelf.keys()?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(&key)?;
            out.push((key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use gitshelf_git::{
        CasOutcome, CommitRecord, GitError, MemoryStore, Object, TreeEntry,
    };
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::value::{Json, Utf8};

    /// A store whose next object read fails once armed.
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_read: Cell<bool>,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                fail_next_read: Cell::new(false),
            }
        }
    }

    impl ObjectStore for FlakyStore {
        fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError> {
            self.inner.write_blob(data)
        }

        fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
            self.inner.write_tree(entries)
        }

        fn write_commit(&self, commit: &CommitRecord) -> Result<GitOid, GitError> {
            self.inner.write_commit(commit)
        }

        fn read_object(&self, oid: GitOid) -> Result<Object, GitError> {
            if self.fail_next_read.replace(false) {
                return Err(GitError::BackendError {
                    message: "transient read failure".to_owned(),
                });
            }
            self.inner.read_object(oid)
        }

        fn has_object(&self, oid: GitOid) -> Result<bool, GitError> {
            self.inner.has_object(oid)
        }

        fn resolve_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
            self.inner.resolve_ref(name)
        }

        fn compare_and_swap_ref(
            &self,
            name: &RefName,
            expected: Option<GitOid>,
            new: GitOid,
        ) -> Result<CasOutcome, GitError> {
            self.inner.compare_and_swap_ref(name, expected, new)
        }
    }

    fn open(store: &MemoryStore) -> Shelf<MemoryStore> {
        Shelf::open(store.clone(), ShelfConfig::default()).unwrap()
    }

    fn open_replaying(store: &MemoryStore) -> Shelf<MemoryStore> {
        let config = ShelfConfig::default().with_conflict_policy(ConflictPolicy::Replay);
        Shelf::open(store.clone(), config).unwrap()
    }

    #[test]
    fn fresh_shelf_is_empty_and_clean() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        assert_eq!(shelf.head(), None);
        assert!(!shelf.is_dirty());
        assert!(shelf.is_empty().unwrap());
        assert_eq!(shelf.commit("nothing").unwrap(), None);
        assert_eq!(store.object_count().unwrap(), 0);
    }

    #[test]
    fn commit_then_reopen() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("foo/bar/git.c", "int main;").unwrap();
        shelf.set("foo/README", "hi").unwrap();
        assert!(shelf.is_dirty());
        let head = shelf.commit("first").unwrap();
        assert!(head.is_some());
        assert!(!shelf.is_dirty());

        let mut again = open(&store);
        assert_eq!(again.head(), head);
        assert_eq!(again.get("foo/bar/git.c").unwrap(), b"int main;");
        assert_eq!(again.keys().unwrap(), ["foo/README", "foo/bar/git.c"]);
        assert_eq!(again.len().unwrap(), 2);
    }

    #[test]
    fn clean_commit_returns_head_without_writing() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("k", "v").unwrap();
        let head = shelf.commit("one").unwrap();
        let writes = store.write_count().unwrap();
        assert_eq!(shelf.commit("two").unwrap(), head);
        assert_eq!(store.write_count().unwrap(), writes);
    }

    #[test]
    fn history_is_linear_unless_disabled() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("k", "1").unwrap();
        let first = shelf.commit("1").unwrap().unwrap();
        shelf.set("k", "2").unwrap();
        shelf.commit("2").unwrap();
        assert_eq!(shelf.parent_ids().unwrap(), vec![first]);
        assert_eq!(shelf.history(None).unwrap().len(), 2);

        let mut config = ShelfConfig::default().with_branch("flat");
        config.shelf.keep_history = false;
        let mut flat = Shelf::open(store.clone(), config).unwrap();
        flat.set("k", "1").unwrap();
        flat.commit("1").unwrap();
        flat.set("k", "2").unwrap();
        flat.commit("2").unwrap();
        assert!(flat.parent_ids().unwrap().is_empty());
    }

    #[test]
    fn losing_writer_gets_concurrent_update_and_keeps_edits() {
        let store = MemoryStore::new();
        let mut a = open(&store);
        let mut b = open(&store);
        a.set("x", "from a").unwrap();
        b.set("y", "from b").unwrap();

        let a_head = a.commit("a").unwrap();
        let err = b.commit("b").unwrap_err();
        assert!(
            matches!(err, ShelfError::ConcurrentUpdate { actual, .. } if actual == a_head),
            "got {err}"
        );
        assert!(b.is_dirty());

        let mut reader = open(&store);
        assert!(!reader.contains("y").unwrap());
        assert_eq!(reader.get("x").unwrap(), b"from a");
    }

    #[test]
    fn replay_policy_rebases_pending_edits() {
        let store = MemoryStore::new();
        let mut a = open(&store);
        let mut b = open_replaying(&store);
        a.set("x", "from a").unwrap();
        b.set("y", "from b").unwrap();
        let a_head = a.commit("a").unwrap().unwrap();

        b.commit("b").unwrap();
        assert_eq!(b.parent_ids().unwrap(), vec![a_head]);

        let mut reader = open(&store);
        assert_eq!(reader.get("x").unwrap(), b"from a");
        assert_eq!(reader.get("y").unwrap(), b"from b");
    }

    #[test]
    fn replay_skips_deletes_of_vanished_entries() {
        let store = MemoryStore::new();
        let mut seed = open(&store);
        seed.set("gone", "1").unwrap();
        seed.set("stay", "2").unwrap();
        seed.commit("seed").unwrap();

        let mut a = open(&store);
        let mut b = open_replaying(&store);
        a.delete("gone").unwrap();
        a.commit("a").unwrap();
        b.delete("gone").unwrap();
        b.set("new", "3").unwrap();
        b.commit("b").unwrap();

        let mut reader = open(&store);
        assert_eq!(reader.keys().unwrap(), ["new", "stay"]);
    }

    #[test]
    fn replay_gives_up_after_max_retries() {
        let store = MemoryStore::new();
        let mut config = ShelfConfig::default().with_conflict_policy(ConflictPolicy::Replay);
        config.commit.max_retries = 0;
        let mut b = Shelf::open(store.clone(), config).unwrap();
        let mut a = open(&store);
        a.set("x", "1").unwrap();
        a.commit("a").unwrap();
        b.set("y", "2").unwrap();
        assert!(matches!(
            b.commit("b"),
            Err(ShelfError::ConcurrentUpdate { .. })
        ));
    }

    #[test]
    fn put_and_get_by_id() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        let id = shelf.put(b"content addressed").unwrap();
        let hex = id.to_string();
        assert_eq!(shelf.get_by_id(&hex).unwrap(), b"content addressed");
        assert!(shelf.contains(&format!("{}/{}", &hex[..2], &hex[2..])).unwrap());
        assert!(shelf.get_by_id("not-hex").is_err());
    }

    #[test]
    fn refresh_follows_other_writers() {
        let store = MemoryStore::new();
        let mut reader = open(&store);
        assert!(!reader.refresh().unwrap());

        let mut writer = open(&store);
        writer.set("k", "v").unwrap();
        let head = writer.commit("w").unwrap();

        assert!(reader.refresh().unwrap());
        assert_eq!(reader.head(), head);
        assert_eq!(reader.get("k").unwrap(), b"v");
    }

    #[test]
    fn refresh_with_pending_edits_under_fail_policy_conflicts() {
        let store = MemoryStore::new();
        let mut mine = open(&store);
        mine.set("mine", "1").unwrap();

        let mut other = open(&store);
        other.set("theirs", "2").unwrap();
        other.commit("other").unwrap();

        assert!(matches!(
            mine.refresh(),
            Err(ShelfError::ConcurrentUpdate { .. })
        ));
        mine.discard().unwrap();
        assert!(!mine.is_dirty());
        assert!(mine.refresh().unwrap());
        assert!(mine.contains("theirs").unwrap());
    }

    #[test]
    fn close_commits_pending_edits() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("k", "v").unwrap();
        let head = shelf.close().unwrap();
        assert_eq!(open(&store).head(), head);
    }

    #[test]
    fn items_pairs_keys_with_bytes() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("b", "2").unwrap();
        shelf.set("a/c", "1").unwrap();
        assert_eq!(
            shelf.items().unwrap(),
            vec![
                ("a/c".to_owned(), b"1".to_vec()),
                ("b".to_owned(), b"2".to_vec())
            ]
        );
    }

    #[test]
    fn failed_replay_keeps_edits_for_the_next_commit() {
        let store = MemoryStore::new();
        let mut a = open(&store);
        let config = ShelfConfig::default().with_conflict_policy(ConflictPolicy::Replay);
        let mut b = Shelf::open(FlakyStore::new(store.clone()), config).unwrap();

        a.set("x", "1").unwrap();
        let a_head = a.commit("a").unwrap();
        b.set("y", "2").unwrap();

        // The conflict triggers a replay whose first read fails.
        b.store().fail_next_read.set(true);
        assert!(matches!(b.commit("b"), Err(ShelfError::Backend(_))));
        assert!(b.is_dirty());
        assert_eq!(b.get("y").unwrap(), b"2");

        let b_head = b.commit("b").unwrap();
        assert_ne!(b_head, a_head);
        assert_eq!(b.parent_ids().unwrap(), vec![a_head.unwrap()]);

        let mut reader = open(&store);
        assert_eq!(reader.keys().unwrap(), ["x", "y"]);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        pinned: bool,
    }

    #[test]
    fn typed_values_roundtrip_through_a_commit() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        let note = Note {
            title: "groceries".to_owned(),
            pinned: true,
        };
        shelf.set_as(&Json::<Note>::new(), "notes/1", &note).unwrap();
        shelf.commit("note").unwrap();

        let mut again = open(&store);
        assert_eq!(again.get_as(&Json::<Note>::new(), "notes/1").unwrap(), note);
        assert!(again.get("notes/1").unwrap().starts_with(b"{"));
    }

    #[test]
    fn undecodable_leaf_reports_its_path() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        shelf.set("notes/bad", "not json").unwrap();
        let err = shelf.get_as(&Json::<Note>::new(), "notes/bad").unwrap_err();
        assert!(matches!(&err, ShelfError::Value { path, .. } if path == "notes/bad"));
        assert!(matches!(
            shelf.get_as(&Utf8, "notes/missing"),
            Err(ShelfError::NotFound { .. })
        ));
    }

    #[test]
    fn book_reads_and_writes_with_one_codec() {
        let store = MemoryStore::new();
        let mut shelf = open(&store);
        {
            let mut book = shelf.book(Utf8);
            book.set("b", &"two".to_owned()).unwrap();
            book.set("a/c", &"one".to_owned()).unwrap();
            assert_eq!(book.get("b").unwrap(), "two");
            assert_eq!(
                book.items().unwrap(),
                vec![
                    ("a/c".to_owned(), "one".to_owned()),
                    ("b".to_owned(), "two".to_owned())
                ]
            );
        }
        assert!(shelf.is_dirty());
        assert_eq!(shelf.get("a/c").unwrap(), b"one");
    }
}
