use tempfile::TempDir;

use gitshelf_git::{
    CasOutcome, CommitRecord, EntryMode, GitError, GitOid, GixStore, MemoryStore, Object,
    ObjectStore, RefName, Signature, Timestamp, TreeEntry,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup_store() -> (TempDir, GixStore) {
    let dir = TempDir::new().unwrap();
    let store = GixStore::init_bare(&dir.path().join("shelf.git")).unwrap();
    (dir, store)
}

fn signature(seconds: i64) -> Signature {
    Signature {
        name: "Test User".to_owned(),
        email: "test@test.com".to_owned(),
        time: Timestamp {
            seconds,
            offset_minutes: 60,
        },
    }
}

/// Write a single-file tree and a root commit on top of it.
/// Returns the commit OID and the tree OID.
fn setup_store_with_commit() -> (TempDir, GixStore, GitOid, GitOid) {
    let (dir, store) = setup_store();
    let blob_oid = store.write_blob(b"hello world\n").unwrap();
    let tree_oid = store
        .write_tree(&[TreeEntry {
            name: "hello.txt".to_owned(),
            mode: EntryMode::Blob,
            oid: blob_oid,
        }])
        .unwrap();
    let commit_oid = store
        .write_commit(&CommitRecord {
            tree: tree_oid,
            parents: vec![],
            author: signature(1_000),
            committer: signature(1_000),
            message: "initial commit\n".to_owned(),
        })
        .unwrap();
    (dir, store, commit_oid, tree_oid)
}

// ===========================================================================
// 1. Opening
// ===========================================================================

#[test]
fn open_or_init_creates_then_reopens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("data.git");
    let first = GixStore::open_or_init(&path).unwrap();
    let oid = first.write_blob(b"persisted").unwrap();
    drop(first);

    let second = GixStore::open_or_init(&path).unwrap();
    assert!(second.has_object(oid).unwrap());
}

#[test]
fn open_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let result = GixStore::open(&dir.path().join("absent"));
    assert!(matches!(result, Err(GitError::BackendError { .. })));
}

// ===========================================================================
// 2. Object operations
// ===========================================================================

#[test]
fn blob_roundtrip() {
    let (_dir, store) = setup_store();
    let data = b"some blob content";
    let oid = store.write_blob(data).unwrap();
    assert_eq!(store.read_blob(oid).unwrap(), data);
}

#[test]
fn blob_id_matches_git_hash_object() {
    let (_dir, store) = setup_store();
    let oid = store.write_blob(b"this is some data").unwrap();
    assert_eq!(oid.to_string(), "82fa9daba4cab515726fff892362b942dc01d625");
}

#[test]
fn has_object_before_and_after_write() {
    let (_dir, store) = setup_store();
    let oid = gitshelf_git::hash_object(gitshelf_git::ObjectKind::Blob, b"later").unwrap();
    assert!(!store.has_object(oid).unwrap());
    assert_eq!(store.write_blob(b"later").unwrap(), oid);
    assert!(store.has_object(oid).unwrap());
}

#[test]
fn write_tree_multiple_entries_is_canonically_ordered() {
    let (_dir, store) = setup_store();
    let blob = store.write_blob(b"x").unwrap();
    let sub = store
        .write_tree(&[TreeEntry {
            name: "inner".to_owned(),
            mode: EntryMode::Blob,
            oid: blob,
        }])
        .unwrap();
    let entries = vec![
        TreeEntry { name: "zeta".to_owned(), mode: EntryMode::BlobExecutable, oid: blob },
        TreeEntry { name: "dir".to_owned(), mode: EntryMode::Tree, oid: sub },
        TreeEntry { name: "alpha".to_owned(), mode: EntryMode::Blob, oid: blob },
    ];
    let tree_oid = store.write_tree(&entries).unwrap();
    let names: Vec<String> = store
        .read_tree(tree_oid)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["alpha", "dir", "zeta"]);
}

#[test]
fn commit_roundtrip() {
    let (_dir, store, commit_oid, tree_oid) = setup_store_with_commit();
    let info = store.read_commit(commit_oid).unwrap();
    assert_eq!(info.tree, tree_oid);
    assert!(info.parents.is_empty());
    assert_eq!(info.message, "initial commit\n");
    assert_eq!(info.author.name, "Test User");
    assert_eq!(info.committer.time.offset_minutes, 60);
}

#[test]
fn commit_with_parent() {
    let (_dir, store, first, tree) = setup_store_with_commit();
    let second = store
        .write_commit(&CommitRecord {
            tree,
            parents: vec![first],
            author: signature(2_000),
            committer: signature(2_000),
            message: "second".to_owned(),
        })
        .unwrap();
    assert_eq!(store.read_commit(second).unwrap().parents, vec![first]);
}

#[test]
fn read_object_reports_kind() {
    let (_dir, store, commit_oid, tree_oid) = setup_store_with_commit();
    assert!(matches!(store.read_object(tree_oid).unwrap(), Object::Tree(_)));
    assert!(matches!(store.read_object(commit_oid).unwrap(), Object::Commit(_)));
    assert!(matches!(
        store.read_blob(commit_oid),
        Err(GitError::Corrupt { .. })
    ));
}

#[test]
fn read_missing_object_is_not_found() {
    let (_dir, store) = setup_store();
    let err = store.read_object(GitOid::from_bytes([7; 20])).unwrap_err();
    assert!(matches!(err, GitError::NotFound { .. }), "got {err}");
}

#[test]
fn gix_and_memory_agree_on_ids() {
    let (_dir, store) = setup_store();
    let memory = MemoryStore::new();
    let blob = store.write_blob(b"shared").unwrap();
    assert_eq!(memory.write_blob(b"shared").unwrap(), blob);
    let entries = [TreeEntry { name: "f".to_owned(), mode: EntryMode::Blob, oid: blob }];
    assert_eq!(
        store.write_tree(&entries).unwrap(),
        memory.write_tree(&entries).unwrap()
    );
}

// ===========================================================================
// 3. Ref operations
// ===========================================================================

#[test]
fn resolve_ref_nonexistent() {
    let (_dir, store) = setup_store();
    let name = RefName::branch("nope").unwrap();
    assert_eq!(store.resolve_ref(&name).unwrap(), None);
}

#[test]
fn cas_creates_ref_when_absent() {
    let (_dir, store, commit_oid, _) = setup_store_with_commit();
    let name = RefName::branch("main").unwrap();
    let outcome = store.compare_and_swap_ref(&name, None, commit_oid).unwrap();
    assert_eq!(outcome, CasOutcome::Updated);
    assert_eq!(store.resolve_ref(&name).unwrap(), Some(commit_oid));
}

#[test]
fn cas_second_creator_conflicts() {
    let (_dir, store, commit_oid, tree) = setup_store_with_commit();
    let other = store
        .write_commit(&CommitRecord {
            tree,
            parents: vec![],
            author: signature(5),
            committer: signature(5),
            message: "other".to_owned(),
        })
        .unwrap();
    let name = RefName::branch("main").unwrap();
    store.compare_and_swap_ref(&name, None, commit_oid).unwrap();

    let outcome = store.compare_and_swap_ref(&name, None, other).unwrap();
    assert_eq!(
        outcome,
        CasOutcome::Conflict {
            actual: Some(commit_oid)
        }
    );
    assert_eq!(store.resolve_ref(&name).unwrap(), Some(commit_oid));
}

#[test]
fn cas_advances_and_rejects_stale_expectation() {
    let (_dir, store, v1, tree) = setup_store_with_commit();
    let v2 = store
        .write_commit(&CommitRecord {
            tree,
            parents: vec![v1],
            author: signature(2),
            committer: signature(2),
            message: "v2".to_owned(),
        })
        .unwrap();
    let v3 = store
        .write_commit(&CommitRecord {
            tree,
            parents: vec![v1],
            author: signature(3),
            committer: signature(3),
            message: "v3".to_owned(),
        })
        .unwrap();
    let name = RefName::branch("main").unwrap();
    store.compare_and_swap_ref(&name, None, v1).unwrap();

    // Writer A advances v1 → v2.
    assert_eq!(
        store.compare_and_swap_ref(&name, Some(v1), v2).unwrap(),
        CasOutcome::Updated
    );
    // Writer B still believes v1 is current.
    assert_eq!(
        store.compare_and_swap_ref(&name, Some(v1), v3).unwrap(),
        CasOutcome::Conflict { actual: Some(v2) }
    );
    assert_eq!(store.resolve_ref(&name).unwrap(), Some(v2));
}

#[test]
fn cas_is_visible_to_a_second_handle() {
    let (dir, store, commit_oid, _) = setup_store_with_commit();
    let name = RefName::branch("main").unwrap();
    store.compare_and_swap_ref(&name, None, commit_oid).unwrap();

    let other = GixStore::open(&dir.path().join("shelf.git")).unwrap();
    assert_eq!(other.resolve_ref(&name).unwrap(), Some(commit_oid));
    assert_eq!(
        other.compare_and_swap_ref(&name, None, commit_oid).unwrap(),
        CasOutcome::Conflict {
            actual: Some(commit_oid)
        }
    );
}
