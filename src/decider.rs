//! # Merge Decider Module
//!
//! The state machine at the heart of reconciliation. Given the chains a
//! request matched, it decides between creating a new primary, attaching a
//! secondary, folding a newer chain into an older one, or doing nothing, and
//! then applies that decision as a sequence of individually-survivable store
//! writes.

use crate::error::ReconcileError;
use crate::grouper::ChainGroup;
use crate::model::{
    Contact, ContactId, ContactUpdate, DomainEvent, IdentifyRequest, LinkPrecedence, NewContact,
};
use crate::store::ContactStore;
use tracing::{debug, warn};

/// The decision reached for one identify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// No chain matched: start a new one.
    CreatePrimary,
    /// The chain already holds everything the request supplied.
    NoOp { root: ContactId },
    /// The request adds a new email or phone to an existing chain.
    AttachSecondary { root: ContactId },
    /// Two chains are proven to be the same person; the newer one is folded
    /// into the older. `attach_new` records whether the request additionally
    /// supplies a value absent from both chains.
    MergeChains {
        older: ContactId,
        newer: ContactId,
        attach_new: bool,
    },
    /// More than two chains matched. Should not occur with well-maintained
    /// chains; handled conservatively by consolidating the oldest without
    /// merging the rest.
    DegenerateMultiChain {
        root: ContactId,
        group_count: usize,
    },
}

/// Decide what to do for a request, given its chain groups ordered by
/// ascending `(root_created_at, root_id)`. Pure; performs no store access.
pub fn decide(request: &IdentifyRequest, groups: &[ChainGroup]) -> MergeAction {
    match groups {
        [] => MergeAction::CreatePrimary,
        [group] => {
            if exact_match(request, &group.members) {
                MergeAction::NoOp { root: group.root_id }
            } else if has_new_information(request, group.members.iter()) {
                MergeAction::AttachSecondary { root: group.root_id }
            } else {
                // All supplied values already exist somewhere in the chain,
                // just recombined across members.
                MergeAction::NoOp { root: group.root_id }
            }
        }
        [older, newer] => MergeAction::MergeChains {
            older: older.root_id,
            newer: newer.root_id,
            attach_new: has_new_information(
                request,
                older.members.iter().chain(newer.members.iter()),
            ),
        },
        _ => MergeAction::DegenerateMultiChain {
            root: groups[0].root_id,
            group_count: groups.len(),
        },
    }
}

/// Apply a decision to the store. Returns the canonical chain root together
/// with the domain events produced; the caller owns publishing them.
pub fn apply(
    store: &mut dyn ContactStore,
    request: &IdentifyRequest,
    action: MergeAction,
) -> Result<(ContactId, Vec<DomainEvent>), ReconcileError> {
    match action {
        MergeAction::CreatePrimary => {
            let created = store.create(NewContact::primary(
                request.email.clone(),
                request.phone_number.clone(),
            ))?;
            debug!(contact = %created.id, "created new primary");
            let events = vec![DomainEvent::ContactCreated {
                contact: created.id,
                link_precedence: LinkPrecedence::Primary,
            }];
            Ok((created.id, events))
        }
        MergeAction::NoOp { root } => {
            debug!(%root, "request carries no new information");
            Ok((root, Vec::new()))
        }
        MergeAction::AttachSecondary { root } => {
            let created = create_secondary(store, request, root)?;
            Ok((root, vec![created]))
        }
        MergeAction::MergeChains {
            older,
            newer,
            attach_new,
        } => {
            let mut events = merge_chains(store, older, newer)?;
            if attach_new {
                events.push(create_secondary(store, request, older)?);
            }
            Ok((older, events))
        }
        MergeAction::DegenerateMultiChain { root, group_count } => {
            warn!(
                %root,
                group_count,
                "matched more than two chains; consolidating the oldest without merging"
            );
            Ok((root, Vec::new()))
        }
    }
}

/// Fold the newer chain into the older one.
///
/// Step order matters for crash recovery: existing secondaries are
/// re-pointed before the newer root is demoted, so no interruption can leave
/// a secondary pointing at another secondary. Every prefix of the sequence is
/// a valid store state. A crash can still strand the newer root as a
/// one-record primary when the request reached its chain only through a
/// re-pointed secondary; the stranded root keeps its own identifiers, so the
/// next request carrying one of them folds it in.
fn merge_chains(
    store: &mut dyn ContactStore,
    older: ContactId,
    newer: ContactId,
) -> Result<Vec<DomainEvent>, ReconcileError> {
    let newer_members = store.chain_members(newer)?;

    for member in &newer_members {
        if member.id == newer || member.linked_id == Some(older) {
            continue;
        }
        store.update(member.id, ContactUpdate::repoint_to(older))?;
    }

    let newer_root_still_primary = newer_members
        .iter()
        .any(|member| member.id == newer && member.is_primary());
    if newer_root_still_primary {
        store.update(newer, ContactUpdate::demote_to(older))?;
    }

    debug!(absorbed = %newer, into = %older, "folded newer chain into older");
    Ok(vec![DomainEvent::ContactMerged {
        absorbed_root: newer,
        into_root: older,
    }])
}

fn create_secondary(
    store: &mut dyn ContactStore,
    request: &IdentifyRequest,
    root: ContactId,
) -> Result<DomainEvent, ReconcileError> {
    let created = store.create(NewContact::secondary(
        request.email.clone(),
        request.phone_number.clone(),
        root,
    ))?;
    debug!(contact = %created.id, %root, "created secondary with new contact information");
    Ok(DomainEvent::ContactCreated {
        contact: created.id,
        link_precedence: LinkPrecedence::Secondary,
    })
}

/// Does any single member already carry every field the request supplied?
/// Absent request fields are non-constraints.
fn exact_match(request: &IdentifyRequest, members: &[Contact]) -> bool {
    members.iter().any(|member| {
        let email_ok = match &request.email {
            Some(email) => member.email.as_deref() == Some(email.as_str()),
            None => true,
        };
        let phone_ok = match &request.phone_number {
            Some(phone) => member.phone_number.as_deref() == Some(phone.as_str()),
            None => true,
        };
        email_ok && phone_ok
    })
}

/// Does the request supply an email or phone absent from every member?
fn has_new_information<'a>(
    request: &IdentifyRequest,
    members: impl Iterator<Item = &'a Contact> + Clone,
) -> bool {
    let new_email = request.email.as_deref().is_some_and(|email| {
        !members
            .clone()
            .any(|member| member.email.as_deref() == Some(email))
    });
    let new_phone = request.phone_number.as_deref().is_some_and(|phone| {
        !members
            .clone()
            .any(|member| member.phone_number.as_deref() == Some(phone))
    });
    new_email || new_phone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, Timestamp};
    use crate::store::MemoryStore;

    fn contact(id: u64, email: Option<&str>, phone: Option<&str>, created_at: Timestamp) -> Contact {
        Contact {
            id: ContactId(id),
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            link_precedence: LinkPrecedence::Primary,
            linked_id: None,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    fn group_of(root: &Contact, extra: Vec<Contact>) -> ChainGroup {
        let mut members = vec![root.clone()];
        members.extend(extra);
        ChainGroup {
            root_id: root.id,
            root_created_at: root.created_at,
            members,
        }
    }

    #[test]
    fn test_no_groups_creates_primary() {
        let request = IdentifyRequest::new(Some("a@x.com"), None);
        assert_eq!(decide(&request, &[]), MergeAction::CreatePrimary);
    }

    #[test]
    fn test_exact_match_is_a_noop() {
        let root = contact(1, Some("a@x.com"), Some("111"), 100);
        let groups = [group_of(&root, vec![])];

        let request = IdentifyRequest::new(Some("a@x.com"), Some("111"));
        assert_eq!(decide(&request, &groups), MergeAction::NoOp { root: root.id });

        // An absent request field is a non-constraint.
        let partial = IdentifyRequest::new(None, Some("111"));
        assert_eq!(decide(&partial, &groups), MergeAction::NoOp { root: root.id });
    }

    #[test]
    fn test_new_value_attaches_secondary() {
        let root = contact(1, Some("a@x.com"), Some("111"), 100);
        let groups = [group_of(&root, vec![])];

        let request = IdentifyRequest::new(Some("b@x.com"), Some("111"));
        assert_eq!(
            decide(&request, &groups),
            MergeAction::AttachSecondary { root: root.id }
        );
    }

    #[test]
    fn test_recombined_known_values_are_a_noop() {
        // Email known from one member, phone from another; nothing new.
        let root = contact(1, Some("a@x.com"), Some("111"), 100);
        let other = contact(2, Some("b@x.com"), Some("222"), 200);
        let groups = [group_of(&root, vec![other])];

        let request = IdentifyRequest::new(Some("b@x.com"), Some("111"));
        assert_eq!(decide(&request, &groups), MergeAction::NoOp { root: root.id });
    }

    #[test]
    fn test_two_groups_merge_oldest_first() {
        let older = contact(1, Some("g@h.edu"), Some("919191"), 100);
        let newer = contact(2, Some("b@h.edu"), Some("717171"), 500);
        let groups = [group_of(&older, vec![]), group_of(&newer, vec![])];

        let request = IdentifyRequest::new(Some("g@h.edu"), Some("717171"));
        assert_eq!(
            decide(&request, &groups),
            MergeAction::MergeChains {
                older: older.id,
                newer: newer.id,
                attach_new: false,
            }
        );
    }

    #[test]
    fn test_two_groups_with_new_value_also_attach() {
        // Both chains matched via the same duplicated email; the phone is new.
        let older = contact(1, Some("dup@x.com"), None, 100);
        let newer = contact(2, Some("dup@x.com"), None, 500);
        let groups = [group_of(&older, vec![]), group_of(&newer, vec![])];

        let request = IdentifyRequest::new(Some("dup@x.com"), Some("999"));
        assert_eq!(
            decide(&request, &groups),
            MergeAction::MergeChains {
                older: older.id,
                newer: newer.id,
                attach_new: true,
            }
        );
    }

    #[test]
    fn test_more_than_two_groups_is_degenerate() {
        let a = contact(1, Some("a@x.com"), None, 100);
        let b = contact(2, Some("b@x.com"), None, 200);
        let c = contact(3, Some("c@x.com"), None, 300);
        let groups = [
            group_of(&a, vec![]),
            group_of(&b, vec![]),
            group_of(&c, vec![]),
        ];

        let request = IdentifyRequest::new(Some("a@x.com"), Some("111"));
        assert_eq!(
            decide(&request, &groups),
            MergeAction::DegenerateMultiChain {
                root: a.id,
                group_count: 3,
            }
        );
    }

    #[test]
    fn test_apply_merge_demotes_and_repoints() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let older = store
            .create(NewContact::primary(Some("g@h.edu".into()), Some("919191".into())))
            .unwrap();
        let newer = store
            .create(NewContact::primary(Some("b@h.edu".into()), Some("717171".into())))
            .unwrap();
        let tail = store
            .create(NewContact::secondary(Some("tail@h.edu".into()), None, newer.id))
            .unwrap();

        let request = IdentifyRequest::new(Some("g@h.edu"), Some("717171"));
        let action = MergeAction::MergeChains {
            older: older.id,
            newer: newer.id,
            attach_new: false,
        };
        let (root, events) = apply(&mut store, &request, action).unwrap();
        assert_eq!(root, older.id);
        assert_eq!(
            events,
            vec![DomainEvent::ContactMerged {
                absorbed_root: newer.id,
                into_root: older.id,
            }]
        );

        let demoted = store.get_by_id(newer.id).unwrap().unwrap();
        assert_eq!(demoted.link_precedence, LinkPrecedence::Secondary);
        assert_eq!(demoted.linked_id, Some(older.id));

        let repointed = store.get_by_id(tail.id).unwrap().unwrap();
        assert_eq!(repointed.linked_id, Some(older.id));
        assert_eq!(repointed.link_precedence, LinkPrecedence::Secondary);
    }

    #[test]
    fn test_apply_merge_is_idempotent() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let older = store
            .create(NewContact::primary(Some("g@h.edu".into()), None))
            .unwrap();
        let newer = store
            .create(NewContact::primary(None, Some("717171".into())))
            .unwrap();

        let request = IdentifyRequest::new(Some("g@h.edu"), Some("717171"));
        let action = MergeAction::MergeChains {
            older: older.id,
            newer: newer.id,
            attach_new: false,
        };
        apply(&mut store, &request, action.clone()).unwrap();
        let writes_after_first = store.metrics().unwrap().writes;

        // Re-applying the same merge touches nothing.
        apply(&mut store, &request, action).unwrap();
        assert_eq!(store.metrics().unwrap().writes, writes_after_first);
    }

    #[test]
    fn test_apply_noop_never_writes() {
        let mut store = MemoryStore::new();
        let request = IdentifyRequest::new(Some("a@x.com"), None);
        let (root, events) =
            apply(&mut store, &request, MergeAction::NoOp { root: ContactId(3) }).unwrap();
        assert_eq!(root, ContactId(3));
        assert!(events.is_empty());
        assert_eq!(store.metrics().unwrap().writes, 0);
    }

    #[test]
    fn test_apply_attach_stores_only_request_fields() {
        let mut store = MemoryStore::with_clock(Clock::logical(1_000, 1_000));
        let root = store
            .create(NewContact::primary(Some("a@x.com".into()), Some("111".into())))
            .unwrap();

        let request = IdentifyRequest::new(None, Some("222"));
        let (_, events) =
            apply(&mut store, &request, MergeAction::AttachSecondary { root: root.id }).unwrap();
        let DomainEvent::ContactCreated { contact, .. } = events[0].clone() else {
            panic!("expected a creation event");
        };

        let secondary = store.get_by_id(contact).unwrap().unwrap();
        assert_eq!(secondary.email, None);
        assert_eq!(secondary.phone_number.as_deref(), Some("222"));
        assert_eq!(secondary.linked_id, Some(root.id));
    }
}
