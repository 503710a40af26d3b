//! Folder hierarchy traversal.
//!
//! Folder-level grants propagate downward: a grant on a root folder
//! covers its whole subtree. [`expand_descendants`] computes that subtree
//! as breadth-first level expansion — one `folders_by_parent` query per
//! tree depth, not per node. The seen set makes the walk terminate even
//! on corrupted cyclic parent chains, though acyclic data is an assumed
//! store invariant.
//!
//! [`root_ancestor_id`] answers the inverse question — which root a
//! folder sits under — from the materialized path alone, without any
//! parent-chain queries.

use std::collections::HashSet;

use uuid::Uuid;

use lockbox_store::models::Folder;
use lockbox_store::AuthzStore;

use crate::error::AuthzError;

/// Expand a set of folder IDs to their full subtrees, roots included.
///
/// Empty input yields an empty set.
///
/// # Errors
///
/// Returns [`AuthzError::Store`] if a level query fails.
pub async fn expand_descendants<S: AuthzStore>(
    store: &S,
    roots: &HashSet<Uuid>,
) -> Result<HashSet<Uuid>, AuthzError> {
    if roots.is_empty() {
        return Ok(HashSet::new());
    }

    let mut seen: HashSet<Uuid> = roots.clone();
    let mut frontier: Vec<Uuid> = roots.iter().copied().collect();

    while !frontier.is_empty() {
        let children = store.folders_by_parent(&frontier).await?;
        frontier = children
            .into_iter()
            .map(|f| f.id)
            .filter(|id| seen.insert(*id))
            .collect();
    }

    Ok(seen)
}

/// The ID of the root folder this folder sits under.
///
/// A root folder is its own root. For nested folders the root is the
/// first segment of the materialized path. Returns `None` if the path is
/// malformed — callers treat that as "no ancestor", not an error.
#[must_use]
pub fn root_ancestor_id(folder: &Folder) -> Option<Uuid> {
    if folder.is_root() {
        return Some(folder.id);
    }
    folder
        .path
        .split('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}
