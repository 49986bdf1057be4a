//! In-memory namespace tree with lazy hydration.
//!
//! A [`Namespace`] mirrors a git tree. Subtrees and leaf payloads loaded from
//! the store start out *unloaded*: only their object id is known. The first
//! operation that needs their content reads it from the store and caches it.
//!
//! Every directory remembers the tree id it was loaded from (its *origin*).
//! Reads never clear it. Any mutation clears the origin of every directory
//! on the path from the root to the change, so the reconciler can reuse the
//! origin of everything that was left untouched.

use std::collections::BTreeMap;
use std::io;

use gitshelf_git::{EntryMode, GitError, GitOid, ObjectKind, ObjectStore, hash_object};
use tracing::{debug, trace};

use crate::error::{Result, ShelfError};
use crate::path::ShelfPath;

/// What lives at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// A leaf holding bytes.
    Leaf,
    /// An internal node holding named children.
    Namespace,
}

/// A child of a directory.
#[derive(Debug)]
pub(crate) enum Node {
    Leaf(Leaf),
    Dir(Dir),
}

impl Node {
    const fn kind(&self) -> EntryKind {
        match self {
            Self::Leaf(_) => EntryKind::Leaf,
            Self::Dir(_) => EntryKind::Namespace,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Leaf {
    pub(crate) content: LeafContent,
    pub(crate) executable: bool,
}

#[derive(Debug)]
pub(crate) enum LeafContent {
    /// Payload lives in the store.
    Unloaded(GitOid),
    /// Payload is in memory. `oid` is the blob id once it is known.
    Loaded { data: Vec<u8>, oid: Option<GitOid> },
}

impl Leaf {
    const fn new(data: Vec<u8>, executable: bool) -> Self {
        Self {
            content: LeafContent::Loaded { data, oid: None },
            executable,
        }
    }

    const fn unloaded(oid: GitOid, executable: bool) -> Self {
        Self {
            content: LeafContent::Unloaded(oid),
            executable,
        }
    }

    /// The blob id if it is known without hashing.
    pub(crate) const fn known_oid(&self) -> Option<GitOid> {
        match self.content {
            LeafContent::Unloaded(oid) | LeafContent::Loaded { oid: Some(oid), .. } => Some(oid),
            LeafContent::Loaded { oid: None, .. } => None,
        }
    }

    pub(crate) const fn mode(&self) -> EntryMode {
        if self.executable {
            EntryMode::BlobExecutable
        } else {
            EntryMode::Blob
        }
    }

    fn data<S: ObjectStore + ?Sized>(&mut self, store: &S) -> Result<&[u8]> {
        if let LeafContent::Unloaded(oid) = self.content {
            let data = store.read_blob(oid)?;
            trace!(%oid, bytes = data.len(), "loaded leaf");
            self.content = LeafContent::Loaded {
                data,
                oid: Some(oid),
            };
        }
        match &self.content {
            LeafContent::Loaded { data, .. } => Ok(data),
            LeafContent::Unloaded(_) => Err(internal("leaf still unloaded after read")),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Dir {
    pub(crate) state: DirState,
    /// Tree id this directory is known to equal. `None` once modified.
    pub(crate) origin: Option<GitOid>,
}

#[derive(Debug)]
pub(crate) enum DirState {
    Unloaded(GitOid),
    /// Placeholder while the tree is being read.
    Loading,
    Loaded(BTreeMap<String, Node>),
}

impl Dir {
    const fn empty() -> Self {
        Self {
            state: DirState::Loaded(BTreeMap::new()),
            origin: None,
        }
    }

    const fn unloaded(oid: GitOid) -> Self {
        Self {
            state: DirState::Unloaded(oid),
            origin: Some(oid),
        }
    }

    /// True for a loaded directory with no children.
    pub(crate) fn is_empty(&self) -> bool {
        matches!(&self.state, DirState::Loaded(children) if children.is_empty())
    }

    fn hydrate<S: ObjectStore + ?Sized>(&mut self, store: &S, location: &str) -> Result<()> {
        let DirState::Unloaded(oid) = self.state else {
            return Ok(());
        };
        self.state = DirState::Loading;
        match load_children(store, oid, location) {
            Ok(children) => {
                debug!(%oid, location, entries = children.len(), "hydrated namespace");
                self.state = DirState::Loaded(children);
                Ok(())
            }
            Err(e) => {
                self.state = DirState::Unloaded(oid);
                Err(e)
            }
        }
    }

    fn children_mut<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        location: &str,
    ) -> Result<&mut BTreeMap<String, Node>> {
        self.hydrate(store, location)?;
        match &mut self.state {
            DirState::Loaded(children) => Ok(children),
            DirState::Unloaded(_) | DirState::Loading => {
                Err(internal("namespace not loaded after hydration"))
            }
        }
    }
}

fn load_children<S: ObjectStore + ?Sized>(
    store: &S,
    oid: GitOid,
    location: &str,
) -> Result<BTreeMap<String, Node>> {
    let entries = store.read_tree(oid)?;
    let mut children = BTreeMap::new();
    for entry in entries {
        let node = match entry.mode {
            EntryMode::Blob => Node::Leaf(Leaf::unloaded(entry.oid, false)),
            EntryMode::BlobExecutable => Node::Leaf(Leaf::unloaded(entry.oid, true)),
            EntryMode::Tree => Node::Dir(Dir::unloaded(entry.oid)),
            EntryMode::Link | EntryMode::Commit => {
                return Err(ShelfError::Unsupported {
                    path: join_location(location, &entry.name),
                    reason: format!("tree entry with mode {}", entry.mode),
                });
            }
        };
        children.insert(entry.name, node);
    }
    Ok(children)
}

fn join_location(location: &str, name: &str) -> String {
    if location.is_empty() {
        name.to_owned()
    } else {
        format!("{location}/{name}")
    }
}

fn location(names: &[String]) -> String {
    names.join("/")
}

fn internal(message: &str) -> ShelfError {
    ShelfError::Backend(GitError::BackendError {
        message: message.to_owned(),
    })
}

/// A hierarchical namespace of named leaves.
///
/// All content-reading operations take the store as a parameter and may load
/// missing pieces from it, which is why they take `&mut self`.
#[derive(Debug)]
pub struct Namespace {
    pub(crate) root: Dir,
    dirty: bool,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// An empty namespace with no stored origin.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: Dir::empty(),
            dirty: false,
        }
    }

    /// A namespace mirroring the stored tree `tree`. Nothing is read until
    /// an operation needs it.
    #[must_use]
    pub const fn from_tree(tree: GitOid) -> Self {
        Self {
            root: Dir::unloaded(tree),
            dirty: false,
        }
    }

    /// The tree id the root is known to equal, if it is unmodified since it
    /// was loaded or last reconciled.
    #[must_use]
    pub const fn origin(&self) -> Option<GitOid> {
        self.root.origin
    }

    /// True if a mutation happened since construction or the last reconcile.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Walk to the directory at `names`, hydrating on the way. `None` if the
    /// walk runs into a leaf or a missing name.
    fn find_dir_mut<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        names: &[String],
    ) -> Result<Option<&mut Dir>> {
        let mut dir = &mut self.root;
        for (depth, name) in names.iter().enumerate() {
            dir = match dir
                .children_mut(store, &location(&names[..depth]))?
                .get_mut(name)
            {
                Some(Node::Dir(child)) => child,
                Some(Node::Leaf(_)) | None => return Ok(None),
            };
        }
        Ok(Some(dir))
    }

    fn node_mut<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
    ) -> Result<Option<&mut Node>> {
        let parents = path.parent_components();
        let Some(dir) = self.find_dir_mut(store, parents)? else {
            return Ok(None);
        };
        Ok(dir
            .children_mut(store, &location(parents))?
            .get_mut(path.file_name()))
    }

    fn leaf_mut<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
    ) -> Result<&mut Leaf> {
        match self.node_mut(store, path)? {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            Some(Node::Dir(_)) => Err(ShelfError::not_found(format!(
                "{path} (a namespace, not a leaf)"
            ))),
            None => Err(ShelfError::not_found(path.to_string())),
        }
    }

    /// Read the payload of the leaf at `path`.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there, or a backend error if
    /// loading fails.
    pub fn get<S: ObjectStore + ?Sized>(&mut self, store: &S, path: &ShelfPath) -> Result<&[u8]> {
        self.leaf_mut(store, path)?.data(store)
    }

    /// What lives at `path`, if anything.
    ///
    /// # Errors
    /// Returns a backend error if loading a subtree fails.
    pub fn kind<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
    ) -> Result<Option<EntryKind>> {
        Ok(self.node_mut(store, path)?.map(|node| node.kind()))
    }

    /// True if a leaf exists at `path`.
    ///
    /// # Errors
    /// Returns a backend error if loading a subtree fails.
    pub fn contains<S: ObjectStore + ?Sized>(&mut self, store: &S, path: &ShelfPath) -> Result<bool> {
        Ok(self.kind(store, path)? == Some(EntryKind::Leaf))
    }

    /// Whether the leaf at `path` carries the executable mode.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there.
    pub fn is_executable<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
    ) -> Result<bool> {
        Ok(self.leaf_mut(store, path)?.executable)
    }

    /// Store `data` at `path`, creating intermediate namespaces.
    ///
    /// An existing leaf keeps its executable flag. A leaf sitting where an
    /// intermediate namespace is needed, or a namespace at `path` itself, is
    /// replaced. Writing bytes identical to the stored ones is a no-op.
    ///
    /// # Errors
    /// Returns a backend error if loading a subtree fails.
    pub fn set<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
        data: Vec<u8>,
    ) -> Result<()> {
        if let Some(Node::Leaf(leaf)) = self.node_mut(store, path)?
            && leaf.known_oid() == Some(hash_object(ObjectKind::Blob, &data)?)
        {
            trace!(%path, "set with unchanged bytes");
            return Ok(());
        }
        self.insert_leaf(store, path, |previous| {
            let executable = matches!(previous, Some(Node::Leaf(l)) if l.executable);
            Leaf::new(data, executable)
        })
    }

    /// Point the leaf at `path` to an existing blob without loading it.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if the store has no object `oid`.
    pub fn set_blob<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
        oid: GitOid,
        executable: bool,
    ) -> Result<()> {
        if !store.has_object(oid)? {
            return Err(ShelfError::not_found(format!("object {oid}")));
        }
        if let Some(Node::Leaf(leaf)) = self.node_mut(store, path)?
            && leaf.known_oid() == Some(oid)
            && leaf.executable == executable
        {
            return Ok(());
        }
        self.insert_leaf(store, path, |_| Leaf::unloaded(oid, executable))
    }

    /// Change the executable flag of the leaf at `path`.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if no leaf exists there.
    pub fn set_executable<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
        executable: bool,
    ) -> Result<()> {
        if self.leaf_mut(store, path)?.executable == executable {
            return Ok(());
        }
        let leaf = self.leaf_mut_invalidating(store, path)?;
        leaf.executable = executable;
        self.dirty = true;
        Ok(())
    }

    /// Like `leaf_mut`, but clears the origin of every ancestor.
    fn leaf_mut_invalidating<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: &ShelfPath,
    ) -> Result<&mut Leaf> {
        let names = path.parent_components();
        let mut dir = &mut self.root;
        for (depth, name) in names.iter().enumerate() {
            dir.origin = None;
            dir = match dir
                .children_mut(store, &location(&names[..depth]))?
                .get_mut(name)
            {
                Some(Node::Dir(child)) => child,
                Some(Node::Leaf(_)) | None => return Err(ShelfError::not_found(path.to_string())),
            };
        }
        dir.origin = None;
        match dir
            .children_mut(store, &location(names))?
            .get_mut(path.file_name())
        {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            Some(Node::Dir(_)) | None => Err(ShelfError::not_found(path.to_string())),
        }
    }

    fn insert_leaf<S, F>(&mut self, store: &S, path: &ShelfPath, make: F) -> Result<()>
    where
        S: ObjectStore + ?Sized,
        F: FnOnce(Option<&Node>) -> Leaf,
    {
        let names = path.parent_components();
        let mut dir = &mut self.root;
        for (depth, name) in names.iter().enumerate() {
            dir.origin = None;
            let node = dir
                .children_mut(store, &location(&names[..depth]))?
                .entry(name.clone())
                .or_insert_with(|| Node::Dir(Dir::empty()));
            if let Node::Leaf(_) = node {
                debug!(path = %location(&names[..=depth]), "replacing leaf with namespace");
                *node = Node::Dir(Dir::empty());
            }
            dir = match node {
                Node::Dir(child) => child,
                Node::Leaf(_) => unreachable!("leaf was just replaced"),
            };
        }
        dir.origin = None;
        let children = dir.children_mut(store, &location(names))?;
        let leaf = make(children.get(path.file_name()));
        children.insert(path.file_name().to_owned(), Node::Leaf(leaf));
        self.dirty = true;
        Ok(())
    }

    /// Remove the entry at `path`. Namespaces left empty are pruned, so the
    /// namespace never contains an empty internal node.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if nothing exists at `path`.
    pub fn delete<S: ObjectStore + ?Sized>(&mut self, store: &S, path: &ShelfPath) -> Result<()> {
        delete_in(&mut self.root, store, path, 0)?;
        self.dirty = true;
        Ok(())
    }

    /// Names of the children of the namespace at `path` (the root for
    /// `None`), in sorted order.
    ///
    /// # Errors
    /// [`ShelfError::NotFound`] if `path` is not a namespace.
    pub fn list<S: ObjectStore + ?Sized>(
        &mut self,
        store: &S,
        path: Option<&ShelfPath>,
    ) -> Result<Vec<String>> {
        let names = path.map_or(&[][..], ShelfPath::components);
        let dir = self
            .find_dir_mut(store, names)?
            .ok_or_else(|| ShelfError::not_found(format!("namespace {}", location(names))))?;
        Ok(dir
            .children_mut(store, &location(names))?
            .keys()
            .cloned()
            .collect())
    }

    /// Every leaf path, depth first in name order. Loads the whole tree.
    ///
    /// # Errors
    /// Returns a backend error if loading a subtree fails.
    pub fn keys<S: ObjectStore + ?Sized>(&mut self, store: &S) -> Result<Vec<String>> {
        let mut out = Vec::new();
        collect_keys(&mut self.root, store, "", &mut out)?;
        Ok(out)
    }

    /// Number of leaves. Loads the whole tree.
    ///
    /// # Errors
    /// Returns a backend error if loading a subtree fails.
    pub fn len<S: ObjectStore + ?Sized>(&mut self, store: &S) -> Result<usize> {
        Ok(self.keys(store)?.len())
    }

    /// Write a description of the loaded part of the tree to `out`.
    ///
    /// Unloaded subtrees are shown by id and not expanded; leaves whose blob
    /// id is not known yet are shown without one.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        match self.root.origin {
            Some(oid) => writeln!(out, "tree {oid}")?,
            None => writeln!(out, "tree (modified)")?,
        }
        dump_dir(&self.root, out, 1)
    }
}

fn delete_in<S: ObjectStore + ?Sized>(
    dir: &mut Dir,
    store: &S,
    path: &ShelfPath,
    depth: usize,
) -> Result<()> {
    let names = path.components();
    let children = dir.children_mut(store, &location(&names[..depth]))?;
    let name = &names[depth];
    if depth + 1 == names.len() {
        if children.remove(name).is_none() {
            return Err(ShelfError::not_found(path.to_string()));
        }
    } else {
        match children.get_mut(name) {
            Some(Node::Dir(child)) => {
                delete_in(child, store, path, depth + 1)?;
                if child.is_empty() {
                    trace!(path = %location(&names[..=depth]), "pruned empty namespace");
                    children.remove(name);
                }
            }
            Some(Node::Leaf(_)) | None => return Err(ShelfError::not_found(path.to_string())),
        }
    }
    dir.origin = None;
    Ok(())
}

fn collect_keys<S: ObjectStore + ?Sized>(
    dir: &mut Dir,
    store: &S,
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    for (name, node) in dir.children_mut(store, prefix)? {
        let path = join_location(prefix, name);
        match node {
            Node::Leaf(_) => out.push(path),
            Node::Dir(child) => collect_keys(child, store, &path, out)?,
        }
    }
    Ok(())
}

fn dump_dir<W: io::Write>(dir: &Dir, out: &mut W, depth: usize) -> io::Result<()> {
    let DirState::Loaded(children) = &dir.state else {
        return Ok(());
    };
    let indent = "  ".repeat(depth);
    for (name, node) in children {
        match node {
            Node::Leaf(leaf) => match leaf.known_oid() {
                Some(oid) => writeln!(out, "{indent}{} blob {oid}: {name}", leaf.mode())?,
                None => writeln!(out, "{indent}{} blob: {name}", leaf.mode())?,
            },
            Node::Dir(child) => {
                match child.origin {
                    Some(oid) => writeln!(out, "{indent}040000 tree {oid}: {name}")?,
                    None => writeln!(out, "{indent}040000 tree: {name}")?,
                }
                dump_dir(child, out, depth + 1)?;
            }
        }
    }
    Ok(())
}
