//! A hierarchical, versioned key/value store kept in a git object database.
//!
//! Values are leaves of a [`Namespace`] addressed by slash-delimited paths.
//! A namespace is persisted as git trees and blobs by [`reconcile`], which
//! writes only what changed, and published as a snapshot (a commit) by a
//! [`CommitWriter`] that advances a history pointer (a ref) with
//! compare-and-swap. A [`SnapshotReader`] turns a pointer or snapshot id back
//! into a lazily loaded namespace.
//!
//! [`Shelf`] bundles these into a session:
//!
//! ```no_run
//! use gitshelf::{Shelf, ShelfConfig};
//!
//! # fn main() -> gitshelf::Result<()> {
//! let mut shelf = Shelf::open_repository("data.git".as_ref(), ShelfConfig::default())?;
//! shelf.set("foo/bar/git.c", "int main;")?;
//! shelf.commit("add git.c")?;
//! assert_eq!(shelf.get("foo/bar/git.c")?, b"int main;");
//! # Ok(())
//! # }
//! ```
//!
//! Leaves hold bytes; a [`ValueCodec`] such as [`Json`] stores typed values
//! through [`Shelf::get_as`], [`Shelf::set_as`] or a [`Book`].
//!
//! All object access goes through the [`ObjectStore`] trait from
//! `gitshelf-git`, so the same code runs against a real repository
//! ([`GixStore`]) or an in-process store ([`MemoryStore`]).

pub mod commit;
pub mod config;
pub mod error;
pub mod path;
pub mod reader;
pub mod reconcile;
pub mod shelf;
pub mod telemetry;
pub mod tree;
pub mod value;

pub use commit::{CommitWriter, Metadata};
pub use config::{ConflictPolicy, Identity, ShelfConfig};
pub use error::{Result, ShelfError};
pub use path::ShelfPath;
pub use reader::{Revision, Snapshot, SnapshotReader};
pub use reconcile::{Reconciliation, reconcile};
pub use shelf::{Book, Shelf};
pub use tree::{EntryKind, Namespace};
pub use value::{Json, Raw, Toml, Utf8, ValueCodec, ValueError};

pub use gitshelf_git::{GitOid, GixStore, MemoryStore, ObjectStore, RefName};
