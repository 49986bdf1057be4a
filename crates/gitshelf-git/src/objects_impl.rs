//! gix-backed object read/write operations.

use crate::error::GitError;
use crate::gix_store::GixStore;
use crate::object::{decode, from_gix_kind, from_gix_oid, to_gix_commit, to_gix_oid, to_gix_tree};
use crate::types::{CommitRecord, GitOid, Object, TreeEntry};

pub fn write_blob(repo: &GixStore, data: &[u8]) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .write_blob(data)
        .map_err(|e| GitError::backend("failed to write blob", e))?;
    let oid = from_gix_oid(id.as_ref())?;
    tracing::trace!(%oid, size = data.len(), "blob written");
    Ok(oid)
}

pub fn write_tree(repo: &GixStore, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
    let tree = to_gix_tree(entries)?;
    let id = repo
        .repo
        .write_object(&tree)
        .map_err(|e| GitError::backend("failed to write tree", e))?;
    let oid = from_gix_oid(id.as_ref())?;
    tracing::trace!(%oid, entries = entries.len(), "tree written");
    Ok(oid)
}

pub fn write_commit(repo: &GixStore, commit: &CommitRecord) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .write_object(&to_gix_commit(commit))
        .map_err(|e| GitError::backend("failed to write commit object", e))?;
    let oid = from_gix_oid(id.as_ref())?;
    tracing::trace!(%oid, parents = commit.parents.len(), "commit written");
    Ok(oid)
}

pub fn read_object(repo: &GixStore, oid: GitOid) -> Result<Object, GitError> {
    let object = repo
        .repo
        .try_find_object(to_gix_oid(oid))
        .map_err(|e| GitError::backend(&format!("failed to look up {oid}"), e))?
        .ok_or_else(|| GitError::NotFound {
            message: format!("object {oid}"),
        })?
        .detach();
    decode(oid, from_gix_kind(oid, object.kind)?, object.data)
}

pub fn has_object(repo: &GixStore, oid: GitOid) -> bool {
    repo.repo.has_object(to_gix_oid(oid))
}
