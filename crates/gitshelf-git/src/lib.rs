//! Object backend for gitshelf.
//!
//! This crate defines the [`ObjectStore`] trait, the single interface through
//! which the shelf engine reaches the git object database. No other gitshelf
//! crate imports gix directly; they depend on `gitshelf-git` and program
//! against the trait.
//!
//! # Crate layout
//!
//! - [`store`]: the [`ObjectStore`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TreeEntry`], [`CommitRecord`], etc.).
//! - [`object`]: object encoding, decoding and id computation through
//!   `gix::objs`, shared by both backends.
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod object;
pub mod store;
pub mod types;

// gix-backed implementation modules
mod gix_store;
mod objects_impl;
mod refs_impl;

mod memory;

pub use gix_store::GixStore;
pub use memory::MemoryStore;

// Re-export the main trait and commonly used types at the crate root for
// ergonomic imports: `use gitshelf_git::{ObjectStore, GitOid, GitError};`
pub use object::{hash_object, tree_id};
pub use error::GitError;
pub use store::ObjectStore;
pub use types::{
    CasOutcome, CommitRecord, EntryMode, GitOid, Object, ObjectKind, OidParseError, RefName,
    RefNameError, Signature, Timestamp, TreeEntry,
};
