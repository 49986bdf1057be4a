//! Resolve revisions to snapshots.

use std::fmt;
use std::str::FromStr;

use gitshelf_git::{CommitRecord, GitOid, ObjectStore, RefName};
use tracing::debug;

use crate::error::{Result, ShelfError};
use crate::tree::Namespace;

/// Something that names a snapshot: a history pointer or a snapshot id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Revision {
    /// A history pointer, resolved at read time.
    Ref(RefName),
    /// A specific snapshot.
    Snapshot(GitOid),
}

impl Revision {
    /// Parse a revision.
    ///
    /// Forty hex digits name a snapshot. `HEAD` and anything under `refs/`
    /// name a pointer as written; any other name is taken as a branch.
    ///
    /// # Errors
    /// [`ShelfError::InvalidPath`] if the name is not a valid ref name.
    pub fn parse(raw: &str) -> Result<Self> {
        if GitOid::is_hex(raw) {
            return Ok(Self::Snapshot(raw.parse()?));
        }
        if raw == "HEAD" || raw.starts_with("refs/") {
            return Ok(Self::Ref(RefName::new(raw)?));
        }
        Ok(Self::Ref(RefName::branch(raw)?))
    }
}

impl FromStr for Revision {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(name) => write!(f, "{name}"),
            Self::Snapshot(oid) => write!(f, "{oid}"),
        }
    }
}

impl From<RefName> for Revision {
    fn from(name: RefName) -> Self {
        Self::Ref(name)
    }
}

impl From<GitOid> for Revision {
    fn from(oid: GitOid) -> Self {
        Self::Snapshot(oid)
    }
}

/// A resolved snapshot with a lazily loaded namespace.
#[derive(Debug)]
pub struct Snapshot {
    /// Id of the commit object.
    pub id: GitOid,
    /// The decoded commit.
    pub record: CommitRecord,
    /// Namespace of the snapshot's root tree. Nothing is loaded yet.
    pub tree: Namespace,
}

/// Read-only access to snapshots in a store.
#[derive(Debug)]
pub struct SnapshotReader<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ObjectStore + ?Sized> SnapshotReader<'a, S> {
    /// A reader over `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The snapshot id `revision` currently names.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if the pointer does not exist or the snapshot
    /// object is missing.
    pub fn resolve_id(&self, revision: &Revision) -> Result<GitOid> {
        match revision {
            Revision::Ref(name) => self
                .store
                .resolve_ref(name)?
                .ok_or_else(|| ShelfError::not_found(format!("history pointer {name}"))),
            Revision::Snapshot(oid) => {
                if self.store.has_object(*oid)? {
                    Ok(*oid)
                } else {
                    Err(ShelfError::not_found(format!("snapshot {oid}")))
                }
            }
        }
    }

    /// Resolve `revision` and prepare its namespace for lazy reading.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if the revision does not exist, or
    /// [`ShelfError::Backend`] if it names something other than a commit.
    pub fn resolve(&self, revision: &Revision) -> Result<Snapshot> {
        let id = self.resolve_id(revision)?;
        let record = self.store.read_commit(id)?;
        debug!(%revision, snapshot = %id, tree = %record.tree, "resolved snapshot");
        Ok(Snapshot {
            id,
            tree: Namespace::from_tree(record.tree),
            record,
        })
    }

    /// Walk first parents from `revision`, newest first, stopping after
    /// `limit` snapshots when given.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if the revision or an ancestor is missing.
    pub fn history(
        &self,
        revision: &Revision,
        limit: Option<usize>,
    ) -> Result<Vec<(GitOid, CommitRecord)>> {
        let mut out = Vec::new();
        let mut next = Some(self.resolve_id(revision)?);
        while let Some(id) = next {
            if limit.is_some_and(|max| out.len() >= max) {
                break;
            }
            let record = self.store.read_commit(id)?;
            next = record.parents.first().copied();
            out.push((id, record));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use gitshelf_git::MemoryStore;

    use super::*;
    use crate::commit::{CommitWriter, Metadata};
    use crate::config::Identity;
    use crate::path::ShelfPath;
    use crate::reconcile::reconcile;

    #[test]
    fn parse_distinguishes_ids_and_names() {
        let hex = "ab".repeat(20);
        assert!(matches!(Revision::parse(&hex).unwrap(), Revision::Snapshot(_)));
        assert_eq!(
            Revision::parse("main").unwrap().to_string(),
            "refs/heads/main"
        );
        assert_eq!(
            Revision::parse("refs/shelves/x").unwrap().to_string(),
            "refs/shelves/x"
        );
        assert!(Revision::parse("bad..name").is_err());
    }

    #[test]
    fn missing_pointer_and_snapshot_are_not_found() {
        let store = MemoryStore::new();
        let reader = SnapshotReader::new(&store);
        for rev in [
            Revision::parse("nope").unwrap(),
            Revision::Snapshot(GitOid::from_bytes([3; 20])),
        ] {
            assert!(matches!(
                reader.resolve(&rev),
                Err(ShelfError::NotFound { .. })
            ));
        }
    }

    #[test]
    fn resolve_and_walk_history() {
        let store = MemoryStore::new();
        let name = RefName::branch("main").unwrap();
        let writer = CommitWriter::new(&store, name.clone());
        let key = ShelfPath::parse("k").unwrap();

        let mut ns = Namespace::new();
        let mut head = None;
        for value in ["1", "2", "3"] {
            ns.set(&store, &key, value.as_bytes().to_vec()).unwrap();
            let tree = reconcile(&store, &mut ns, None).unwrap().tree;
            let parents: Vec<GitOid> = head.into_iter().collect();
            let meta = Metadata::now(&Identity::default(), value);
            head = Some(writer.commit(tree, &parents, &meta, head).unwrap());
        }

        let reader = SnapshotReader::new(&store);
        let rev = Revision::from(name);
        let mut snapshot = reader.resolve(&rev).unwrap();
        assert_eq!(Some(snapshot.id), head);
        assert_eq!(snapshot.tree.get(&store, &key).unwrap(), b"3");

        let log = reader.history(&rev, None).unwrap();
        let messages: Vec<&str> = log.iter().map(|(_, r)| r.message.as_str()).collect();
        assert_eq!(messages, ["3", "2", "1"]);
        assert_eq!(reader.history(&rev, Some(2)).unwrap().len(), 2);

        // An older snapshot is still readable by id.
        let (oldest, _) = log[2].clone();
        let mut old = reader.resolve(&Revision::from(oldest)).unwrap();
        assert_eq!(old.tree.get(&store, &key).unwrap(), b"1");
    }
}
