//! Persist a namespace as git trees and blobs.
//!
//! Reconciling walks the namespace bottom-up. Any directory that still knows
//! its origin tree id is reused without being read or written, so the cost of
//! persisting a change is proportional to the number of modified paths, not to
//! the size of the namespace. Objects the store already holds are not
//! rewritten.

use std::collections::BTreeSet;

use gitshelf_git::{EntryMode, GitError, GitOid, ObjectKind, ObjectStore, TreeEntry, hash_object, tree_id};
use tracing::{debug, trace};

use crate::error::{Result, ShelfError};
use crate::tree::{Dir, DirState, Leaf, LeafContent, Namespace, Node};

/// Outcome of [`reconcile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    /// Root tree id of the namespace.
    pub tree: GitOid,
    /// Objects that were absent from the store and have now been written.
    pub written: BTreeSet<GitOid>,
}

impl Reconciliation {
    /// True if the resulting tree differs from `base`.
    #[must_use]
    pub fn changed_from(&self, base: Option<GitOid>) -> bool {
        base != Some(self.tree)
    }
}

/// Write every modified part of `namespace` to `store` and return its root
/// tree id.
///
/// `base` is the tree the namespace was loaded from, if any. When the root is
/// untouched and still equals `base`, nothing is visited at all.
///
/// On success the namespace remembers the new ids, so reconciling again
/// without further edits writes nothing.
///
/// # Errors
/// Returns [`ShelfError::Backend`] if the store fails. Objects written before
/// the failure stay in the store; they are unreferenced and harmless.
pub fn reconcile<S: ObjectStore + ?Sized>(
    store: &S,
    namespace: &mut Namespace,
    base: Option<GitOid>,
) -> Result<Reconciliation> {
    if let (Some(origin), Some(base)) = (namespace.origin(), base)
        && origin == base
    {
        trace!(tree = %origin, "namespace untouched since load");
        namespace.mark_clean();
        return Ok(Reconciliation {
            tree: origin,
            written: BTreeSet::new(),
        });
    }

    let mut writer = Writer {
        store,
        written: BTreeSet::new(),
    };
    let tree = writer.dir(&mut namespace.root, "")?;
    namespace.mark_clean();
    debug!(%tree, written = writer.written.len(), "reconciled namespace");
    Ok(Reconciliation {
        tree,
        written: writer.written,
    })
}

struct Writer<'a, S: ?Sized> {
    store: &'a S,
    written: BTreeSet<GitOid>,
}

impl<S: ObjectStore + ?Sized> Writer<'_, S> {
    fn dir(&mut self, dir: &mut Dir, location: &str) -> Result<GitOid> {
        if let Some(oid) = dir.origin {
            return Ok(oid);
        }
        let children = match &mut dir.state {
            DirState::Loaded(children) => children,
            DirState::Unloaded(oid) => {
                let oid = *oid;
                dir.origin = Some(oid);
                return Ok(oid);
            }
            DirState::Loading => {
                return Err(ShelfError::Backend(GitError::BackendError {
                    message: format!("namespace {location:?} is mid-load"),
                }));
            }
        };

        let mut entries = Vec::with_capacity(children.len());
        for (name, node) in children.iter_mut() {
            let (mode, oid) = match node {
                Node::Leaf(leaf) => (leaf.mode(), self.leaf(leaf)?),
                // Emptied in this session; a stored empty tree keeps its origin.
                Node::Dir(child) if child.origin.is_none() && child.is_empty() => continue,
                Node::Dir(child) => {
                    let path = if location.is_empty() {
                        name.clone()
                    } else {
                        format!("{location}/{name}")
                    };
                    (EntryMode::Tree, self.dir(child, &path)?)
                }
            };
            entries.push(TreeEntry {
                name: name.clone(),
                mode,
                oid,
            });
        }

        let oid = tree_id(&entries)?;
        if !self.store.has_object(oid)? {
            let stored = self.store.write_tree(&entries)?;
            debug!(%stored, location, entries = entries.len(), "wrote tree");
            self.written.insert(stored);
        }
        dir.origin = Some(oid);
        Ok(oid)
    }

    fn leaf(&mut self, leaf: &mut Leaf) -> Result<GitOid> {
        match &mut leaf.content {
            LeafContent::Unloaded(oid) | LeafContent::Loaded { oid: Some(oid), .. } => Ok(*oid),
            LeafContent::Loaded { data, oid } => {
                let id = hash_object(ObjectKind::Blob, data)?;
                if !self.store.has_object(id)? {
                    let stored = self.store.write_blob(data)?;
                    debug!(%stored, bytes = data.len(), "wrote blob");
                    self.written.insert(stored);
                }
                *oid = Some(id);
                Ok(id)
            }
        }
    }
}
