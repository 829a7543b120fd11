//! # Consolidator Module
//!
//! Builds the externally visible snapshot of a chain: primary id, ordered
//! unique emails and phone numbers, and the secondary ids. Read-only; the
//! first email and phone always come from the primary record.

use crate::error::ReconcileError;
use crate::model::{ConsolidatedContact, Contact, ContactId};
use crate::store::ContactStore;
use tracing::error;

/// Reload the chain rooted at `root_id` and build its consolidated view.
///
/// The root is assumed to already be the canonical primary after any merge; a
/// missing root at this point is a fatal integrity fault.
pub fn consolidate(
    store: &dyn ContactStore,
    root_id: ContactId,
) -> Result<ConsolidatedContact, ReconcileError> {
    let members = store.chain_members(root_id)?;

    let primary = members
        .iter()
        .find(|member| member.id == root_id)
        .cloned()
        .ok_or_else(|| {
            error!(%root_id, "chain root vanished between merge and consolidation");
            ReconcileError::integrity(format!("chain root {root_id} could not be reloaded"))
        })?;

    let mut secondaries: Vec<&Contact> = members
        .iter()
        .filter(|member| member.id != root_id)
        .collect();
    secondaries.sort_by_key(|member| (member.created_at, member.id));

    let mut emails = Vec::new();
    let mut phone_numbers = Vec::new();
    push_unique(&mut emails, primary.email.as_deref());
    push_unique(&mut phone_numbers, primary.phone_number.as_deref());
    for secondary in &secondaries {
        push_unique(&mut emails, secondary.email.as_deref());
        push_unique(&mut phone_numbers, secondary.phone_number.as_deref());
    }

    Ok(ConsolidatedContact {
        primary_contact_id: primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids: secondaries.iter().map(|member| member.id).collect(),
    })
}

/// First occurrence wins; comparisons are case-sensitive.
fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(value) = value {
        if !values.iter().any(|existing| existing == value) {
            values.push(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::model::NewContact;
    use crate::store::MemoryStore;

    #[test]
    fn test_single_primary_chain() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let primary = store
            .create(NewContact::primary(Some("a@x.com".into()), Some("111".into())))
            .unwrap();

        let view = consolidate(&store, primary.id).unwrap();
        assert_eq!(view.primary_contact_id, primary.id);
        assert_eq!(view.emails, vec!["a@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111"]);
        assert!(view.secondary_contact_ids.is_empty());
    }

    #[test]
    fn test_primary_values_lead_and_duplicates_collapse() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let primary = store
            .create(NewContact::primary(Some("a@x.com".into()), Some("111".into())))
            .unwrap();
        let older_secondary = store
            .create(NewContact::secondary(
                Some("b@x.com".into()),
                Some("111".into()),
                primary.id,
            ))
            .unwrap();
        let newer_secondary = store
            .create(NewContact::secondary(
                Some("a@x.com".into()),
                Some("222".into()),
                primary.id,
            ))
            .unwrap();

        let view = consolidate(&store, primary.id).unwrap();
        assert_eq!(view.emails, vec!["a@x.com", "b@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111", "222"]);
        assert_eq!(
            view.secondary_contact_ids,
            vec![older_secondary.id, newer_secondary.id]
        );
    }

    #[test]
    fn test_case_sensitive_dedup() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let primary = store
            .create(NewContact::primary(Some("A@X.com".into()), None))
            .unwrap();
        store
            .create(NewContact::secondary(Some("a@x.com".into()), None, primary.id))
            .unwrap();

        let view = consolidate(&store, primary.id).unwrap();
        assert_eq!(view.emails, vec!["A@X.com", "a@x.com"]);
    }

    #[test]
    fn test_secondaries_ordered_by_creation_time() {
        let mut store = MemoryStore::new();
        let mk = |id: u64, email: &str, created_at| Contact {
            id: ContactId(id),
            email: Some(email.to_string()),
            phone_number: None,
            link_precedence: if id == 1 {
                crate::model::LinkPrecedence::Primary
            } else {
                crate::model::LinkPrecedence::Secondary
            },
            linked_id: (id != 1).then_some(ContactId(1)),
            created_at,
            updated_at: created_at,
            deleted_at: None,
        };
        store.insert_contact(mk(1, "p@x.com", 100));
        // Inserted out of creation order on purpose.
        store.insert_contact(mk(3, "late@x.com", 900));
        store.insert_contact(mk(2, "early@x.com", 200));

        let view = consolidate(&store, ContactId(1)).unwrap();
        assert_eq!(view.emails, vec!["p@x.com", "early@x.com", "late@x.com"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId(2), ContactId(3)]);
    }

    #[test]
    fn test_missing_root_is_an_integrity_fault() {
        let store = MemoryStore::new();
        let err = consolidate(&store, ContactId(42)).unwrap_err();
        assert!(matches!(err, ReconcileError::IntegrityFault { .. }));
    }
}
