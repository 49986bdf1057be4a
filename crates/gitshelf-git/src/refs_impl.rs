//! gix-backed ref resolution and compare-and-swap updates.

use gix::refs::transaction::{Change, LogChange, PreviousValue, RefLog};
use gix::refs::{FullName, Target};

use crate::error::GitError;
use crate::gix_store::GixStore;
use crate::object::{from_gix_oid, to_gix_oid};
use crate::types::{CasOutcome, GitOid, RefName};

pub fn resolve_ref(repo: &GixStore, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut r)) => {
            let id = r
                .peel_to_id_in_place()
                .map_err(|e| GitError::backend(&format!("peel {name}"), e))?;
            from_gix_oid(id.as_ref()).map(Some)
        }
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::backend(&format!("find {name}"), e)),
    }
}

pub fn compare_and_swap_ref(
    repo: &GixStore,
    name: &RefName,
    expected: Option<GitOid>,
    new: GitOid,
) -> Result<CasOutcome, GitError> {
    // Fast rejection; the transaction below re-checks under the ref lock.
    let current = resolve_ref(repo, name)?;
    if current != expected {
        return Ok(CasOutcome::Conflict { actual: current });
    }

    let full_name: FullName = name
        .as_str()
        .try_into()
        .map_err(|e: gix::validate::reference::name::Error| GitError::InvalidRefName {
            value: name.to_string(),
            reason: e.to_string(),
        })?;

    let previous = match expected {
        None => PreviousValue::MustNotExist,
        Some(old) => PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(old))),
    };

    let edit = gix::refs::transaction::RefEdit {
        change: Change::Update {
            log: LogChange {
                mode: RefLog::AndReference,
                force_create_reflog: false,
                message: "gitshelf: advance".into(),
            },
            expected: previous,
            new: Target::Object(to_gix_oid(new)),
        },
        name: full_name,
        deref: false,
    };

    match repo.repo.edit_references([edit]) {
        Ok(_) => Ok(CasOutcome::Updated),
        Err(e) => {
            // Lost the race between the fast check and the locked update, or a
            // genuine failure. The ref's value now tells the two apart.
            let actual = resolve_ref(repo, name)?;
            if actual == expected {
                Err(GitError::backend(&format!("update {name}"), e))
            } else {
                tracing::debug!(%name, error = %e, "ref transaction rejected");
                Ok(CasOutcome::Conflict { actual })
            }
        }
    }
}
