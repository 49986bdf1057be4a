//! Shared test helpers for gitshelf integration tests.
//!
//! All tests use temp directories, so there are no side effects on any real
//! repository. Each test gets its own bare repository via `setup_store()`.

#![allow(dead_code)]

use std::path::PathBuf;

use gitshelf::{GixStore, Shelf, ShelfConfig};
use tempfile::TempDir;

/// A bare repository in a fresh temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn setup_store() -> (TempDir, PathBuf, GixStore) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("shelf.git");
    let store = GixStore::init_bare(&path).expect("failed to init bare repo");
    (dir, path, store)
}

/// A second, independent handle on the repository at `path`, as another
/// process would open it.
pub fn reopen(path: &std::path::Path) -> GixStore {
    GixStore::open(path).expect("failed to reopen repo")
}

/// Open a shelf with default configuration on its own store handle.
pub fn open_shelf(path: &std::path::Path) -> Shelf<GixStore> {
    Shelf::open(reopen(path), ShelfConfig::default()).expect("failed to open shelf")
}
