//! Conversions between gitshelf's object types and gix's object model.
//!
//! Both backends encode, decode and hash through `gix::objs`, so an object
//! written to a [`MemoryStore`](crate::MemoryStore) gets exactly the id a
//! real repository would assign.

use std::collections::BTreeSet;

use gix::objs::WriteTo as _;
use gix::objs::bstr::ByteSlice as _;

use crate::error::GitError;
use crate::types::{
    CommitRecord, EntryMode, GitOid, Object, ObjectKind, Signature, Timestamp, TreeEntry,
};

// ---------------------------------------------------------------------------
// Id and kind conversion
// ---------------------------------------------------------------------------

/// Convert our `GitOid` to a `gix::ObjectId`.
pub(crate) fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from(*oid.as_bytes())
}

/// Convert a `gix::oid` to our `GitOid`.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> Result<GitOid, GitError> {
    let bytes: [u8; 20] = oid
        .as_bytes()
        .try_into()
        .map_err(|_| GitError::InvalidOid {
            value: oid.to_string(),
            reason: "only SHA-1 repositories are supported".to_owned(),
        })?;
    Ok(GitOid::from_bytes(bytes))
}

pub(crate) const fn to_gix_kind(kind: ObjectKind) -> gix::objs::Kind {
    match kind {
        ObjectKind::Blob => gix::objs::Kind::Blob,
        ObjectKind::Tree => gix::objs::Kind::Tree,
        ObjectKind::Commit => gix::objs::Kind::Commit,
    }
}

pub(crate) fn from_gix_kind(oid: GitOid, kind: gix::objs::Kind) -> Result<ObjectKind, GitError> {
    match kind {
        gix::objs::Kind::Blob => Ok(ObjectKind::Blob),
        gix::objs::Kind::Tree => Ok(ObjectKind::Tree),
        gix::objs::Kind::Commit => Ok(ObjectKind::Commit),
        gix::objs::Kind::Tag => Err(GitError::Corrupt {
            oid,
            reason: "annotated tags are not supported".to_owned(),
        }),
    }
}

const fn to_gix_entry_kind(mode: EntryMode) -> gix::objs::tree::EntryKind {
    match mode {
        EntryMode::Blob => gix::objs::tree::EntryKind::Blob,
        EntryMode::BlobExecutable => gix::objs::tree::EntryKind::BlobExecutable,
        EntryMode::Tree => gix::objs::tree::EntryKind::Tree,
        EntryMode::Link => gix::objs::tree::EntryKind::Link,
        EntryMode::Commit => gix::objs::tree::EntryKind::Commit,
    }
}

const fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the git object id of `body` stored as an object of `kind`.
///
/// # Errors
/// Returns [`GitError::BackendError`] if the hasher rejects the input (SHA-1
/// collision detection).
pub fn hash_object(kind: ObjectKind, body: &[u8]) -> Result<GitOid, GitError> {
    let id = gix::objs::compute_hash(gix::hash::Kind::Sha1, to_gix_kind(kind), body)
        .map_err(|e| GitError::backend(&format!("failed to hash {kind}"), e))?;
    from_gix_oid(&id)
}

/// The id `entries` would get if written as a tree, without writing it.
///
/// # Errors
/// Returns [`GitError::BackendError`] for the listings
/// [`ObjectStore::write_tree`](crate::ObjectStore::write_tree) rejects.
pub fn tree_id(entries: &[TreeEntry]) -> Result<GitOid, GitError> {
    let body = encode(&to_gix_tree(entries)?)?;
    hash_object(ObjectKind::Tree, &body)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Build a gix tree in canonical order.
///
/// Names must be non-empty, free of `/` and NUL, and unique.
pub(crate) fn to_gix_tree(entries: &[TreeEntry]) -> Result<gix::objs::Tree, GitError> {
    let mut seen = BTreeSet::new();
    let mut tree = gix::objs::Tree::empty();
    for entry in entries {
        if entry.name.is_empty() || entry.name.contains(['/', '\0']) {
            return Err(GitError::BackendError {
                message: format!("invalid tree entry name {:?}", entry.name),
            });
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(GitError::BackendError {
                message: format!("duplicate tree entry {:?}", entry.name),
            });
        }
        tree.entries.push(gix::objs::tree::Entry {
            mode: to_gix_entry_kind(entry.mode).into(),
            filename: entry.name.as_str().into(),
            oid: to_gix_oid(entry.oid),
        });
    }
    // `tree::Entry`'s ordering is git's: subtrees compare as if suffixed with '/'.
    tree.entries.sort();
    Ok(tree)
}

fn to_gix_signature(sig: &Signature) -> gix::actor::Signature {
    gix::actor::Signature {
        name: sig.name.as_str().into(),
        email: sig.email.as_str().into(),
        time: gix::date::Time {
            seconds: sig.time.seconds,
            offset: sig.time.offset_minutes * 60,
        },
    }
}

pub(crate) fn to_gix_commit(record: &CommitRecord) -> gix::objs::Commit {
    gix::objs::Commit {
        tree: to_gix_oid(record.tree),
        parents: record.parents.iter().map(|p| to_gix_oid(*p)).collect(),
        author: to_gix_signature(&record.author),
        committer: to_gix_signature(&record.committer),
        encoding: None,
        message: record.message.as_str().into(),
        extra_headers: Vec::new(),
    }
}

/// Serialize any gix object into its loose-object body.
pub(crate) fn encode(object: &impl gix::objs::WriteTo) -> Result<Vec<u8>, GitError> {
    let mut buf = Vec::new();
    object
        .write_to(&mut buf)
        .map_err(|e| GitError::backend(&format!("failed to encode {}", object.kind()), e))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode an object body of a known kind.
///
/// Tree entry names must be UTF-8: a lossy name would be written back under
/// a different name on the next rebuild of its directory.
pub(crate) fn decode(oid: GitOid, kind: ObjectKind, data: Vec<u8>) -> Result<Object, GitError> {
    let corrupt = |reason: String| GitError::Corrupt { oid, reason };
    match kind {
        ObjectKind::Blob => Ok(Object::Blob(data)),
        ObjectKind::Tree => {
            let tree =
                gix::objs::TreeRef::from_bytes(&data).map_err(|e| corrupt(e.to_string()))?;
            let entries = tree
                .entries
                .iter()
                .map(|entry| {
                    let name = entry.filename.to_str().map_err(|_| {
                        corrupt(format!("tree entry name {:?} is not UTF-8", entry.filename))
                    })?;
                    Ok(TreeEntry {
                        name: name.to_owned(),
                        mode: from_gix_entry_mode(entry.mode),
                        oid: from_gix_oid(entry.oid)?,
                    })
                })
                .collect::<Result<Vec<_>, GitError>>()?;
            Ok(Object::Tree(entries))
        }
        ObjectKind::Commit => {
            let commit =
                gix::objs::CommitRef::from_bytes(&data).map_err(|e| corrupt(e.to_string()))?;
            Ok(Object::Commit(CommitRecord {
                tree: from_gix_oid(&commit.tree())?,
                parents: commit
                    .parents()
                    .map(|p| from_gix_oid(&p))
                    .collect::<Result<_, _>>()?,
                author: from_gix_signature(oid, commit.author())?,
                committer: from_gix_signature(oid, commit.committer())?,
                message: commit.message.to_string(),
            }))
        }
    }
}

fn from_gix_signature(oid: GitOid, sig: gix::actor::SignatureRef<'_>) -> Result<Signature, GitError> {
    let time = sig.time().map_err(|e| GitError::Corrupt {
        oid,
        reason: format!("bad signature time {:?}: {e}", sig.time),
    })?;
    Ok(Signature {
        name: sig.name.to_string(),
        email: sig.email.to_string(),
        time: Timestamp {
            seconds: time.seconds,
            offset_minutes: time.offset / 60,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(offset_minutes: i32) -> Signature {
        Signature {
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
            time: Timestamp {
                seconds: 1_700_000_000,
                offset_minutes,
            },
        }
    }

    fn entry(name: &str, mode: EntryMode, oid: GitOid) -> TreeEntry {
        TreeEntry {
            name: name.to_owned(),
            mode,
            oid,
        }
    }

    fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
        encode(&to_gix_tree(entries).unwrap()).unwrap()
    }

    #[test]
    fn known_blob_id_matches_git() {
        // `echo -n 'this is some data' | git hash-object --stdin`
        let oid = hash_object(ObjectKind::Blob, b"this is some data").unwrap();
        assert_eq!(oid.to_string(), "82fa9daba4cab515726fff892362b942dc01d625");
    }

    #[test]
    fn empty_tree_id_matches_git() {
        assert_eq!(
            tree_id(&[]).unwrap().to_string(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn tree_encoding_is_order_independent() {
        let blob = hash_object(ObjectKind::Blob, b"x").unwrap();
        let a = entry("a", EntryMode::Blob, blob);
        let b = entry("b", EntryMode::BlobExecutable, blob);
        assert_eq!(
            encode_tree(&[a.clone(), b.clone()]),
            encode_tree(&[b, a])
        );
    }

    #[test]
    fn subtree_sorts_as_if_slash_suffixed() {
        let oid = GitOid::from_bytes([1; 20]);
        let dir = entry("foo", EntryMode::Tree, oid);
        let file = entry("foo.txt", EntryMode::Blob, oid);
        // "foo.txt" < "foo/" because '.' (0x2e) < '/' (0x2f).
        let body = encode_tree(&[dir, file]);
        let Object::Tree(decoded) = decode(oid, ObjectKind::Tree, body).unwrap() else {
            panic!("expected a tree");
        };
        assert_eq!(decoded[0].name, "foo.txt");
        assert_eq!(decoded[1].name, "foo");
        assert_eq!(decoded[1].mode, EntryMode::Tree);
    }

    #[test]
    fn tree_rejects_duplicates_and_bad_names() {
        let oid = GitOid::from_bytes([2; 20]);
        let e = entry("x", EntryMode::Blob, oid);
        assert!(to_gix_tree(&[e.clone(), e]).is_err());
        assert!(to_gix_tree(&[entry("a/b", EntryMode::Blob, oid)]).is_err());
        assert!(to_gix_tree(&[entry("", EntryMode::Blob, oid)]).is_err());
    }

    #[test]
    fn tree_decode_rejects_truncation() {
        let oid = GitOid::from_bytes([3; 20]);
        let mut body = encode_tree(&[entry("f", EntryMode::Blob, oid)]);
        body.truncate(body.len() - 5);
        assert!(matches!(
            decode(oid, ObjectKind::Tree, body),
            Err(GitError::Corrupt { .. })
        ));
    }

    #[test]
    fn tree_decode_rejects_non_utf8_names() {
        let oid = GitOid::from_bytes([4; 20]);
        let mut body = b"100644 caf\xe9\0".to_vec();
        body.extend_from_slice(oid.as_bytes());
        assert!(matches!(
            decode(oid, ObjectKind::Tree, body),
            Err(GitError::Corrupt { .. })
        ));
    }

    #[test]
    fn commit_decode_restores_every_field() {
        let record = CommitRecord {
            tree: GitOid::from_bytes([4; 20]),
            parents: vec![GitOid::from_bytes([5; 20]), GitOid::from_bytes([6; 20])],
            author: sig(-330),
            committer: sig(120),
            message: "first line\n\nbody\n".to_owned(),
        };
        let body = encode(&to_gix_commit(&record)).unwrap();
        let oid = hash_object(ObjectKind::Commit, &body).unwrap();
        assert_eq!(
            decode(oid, ObjectKind::Commit, body).unwrap(),
            Object::Commit(record)
        );
    }

    #[test]
    fn commit_decode_skips_unknown_headers() {
        let raw = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                   author A <a@x> 1 +0000\n\
                   committer C <c@x> 2 -0100\n\
                   gpgsig -----BEGIN-----\n \
                   continued\n \
                   -----END-----\n\
                   \n\
                   msg";
        let Object::Commit(decoded) =
            decode(GitOid::ZERO, ObjectKind::Commit, raw.as_bytes().to_vec()).unwrap()
        else {
            panic!("expected a commit");
        };
        assert!(decoded.parents.is_empty());
        assert_eq!(decoded.committer.time.offset_minutes, -60);
        assert_eq!(decoded.message, "msg");
    }

    #[test]
    fn commit_without_tree_is_corrupt() {
        let raw = b"author A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\nm".to_vec();
        assert!(matches!(
            decode(GitOid::ZERO, ObjectKind::Commit, raw),
            Err(GitError::Corrupt { .. })
        ));
    }

    #[test]
    fn signature_with_angle_brackets_is_rejected() {
        let mut author = sig(0);
        author.name = "Eve <evil>".to_owned();
        let record = CommitRecord {
            tree: GitOid::ZERO,
            parents: vec![],
            author,
            committer: sig(0),
            message: "m".to_owned(),
        };
        assert!(matches!(
            encode(&to_gix_commit(&record)),
            Err(GitError::BackendError { .. })
        ));
    }
}
