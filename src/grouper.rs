//! # Chain Grouper Module
//!
//! Partitions matched contacts by the primary chain they belong to and
//! resolves each chain's root creation time. A secondary whose link cannot be
//! resolved to an existing primary is a fatal integrity fault, not a
//! recoverable condition.

use crate::clock::Timestamp;
use crate::error::ReconcileError;
use crate::model::{Contact, ContactId};
use crate::store::ContactStore;
use rustc_hash::FxHashMap;
use tracing::error;

/// A chain observed in the matched set.
///
/// `members` holds exactly the matched contacts belonging to this chain, not
/// necessarily the chain's full membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainGroup {
    pub root_id: ContactId,
    pub root_created_at: Timestamp,
    pub members: Vec<Contact>,
}

/// Group matched contacts by chain root, ordered by ascending
/// `(root_created_at, root_id)`. Identical creation timestamps fall back to
/// id order so the result is a deterministic total order.
pub fn group_by_chain(
    store: &dyn ContactStore,
    matched: &[Contact],
) -> Result<Vec<ChainGroup>, ReconcileError> {
    let mut members_by_root: FxHashMap<ContactId, Vec<Contact>> = FxHashMap::default();
    for contact in matched {
        members_by_root
            .entry(contact.chain_root())
            .or_default()
            .push(contact.clone());
    }

    let mut groups = Vec::with_capacity(members_by_root.len());
    for (root_id, members) in members_by_root {
        let root_created_at = resolve_root_created_at(store, root_id, &members)?;
        groups.push(ChainGroup {
            root_id,
            root_created_at,
            members,
        });
    }

    groups.sort_by_key(|group| (group.root_created_at, group.root_id));
    Ok(groups)
}

/// Find the root's creation time, fetching the root by id when it was not
/// itself part of the matched set.
fn resolve_root_created_at(
    store: &dyn ContactStore,
    root_id: ContactId,
    members: &[Contact],
) -> Result<Timestamp, ReconcileError> {
    if let Some(root) = members.iter().find(|contact| contact.id == root_id) {
        return Ok(root.created_at);
    }

    let root = store.get_by_id(root_id)?.ok_or_else(|| {
        let member_ids: Vec<ContactId> = members.iter().map(|c| c.id).collect();
        error!(%root_id, ?member_ids, "secondary points at a missing primary");
        ReconcileError::integrity(format!(
            "chain root {root_id} referenced by {member_ids:?} does not exist"
        ))
    })?;

    if !root.is_primary() {
        let member_ids: Vec<ContactId> = members.iter().map(|c| c.id).collect();
        error!(%root_id, ?member_ids, "chain root is itself a secondary");
        return Err(ReconcileError::integrity(format!(
            "chain root {root_id} referenced by {member_ids:?} is not a primary"
        )));
    }

    Ok(root.created_at)
}
