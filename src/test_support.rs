//! Shared fixtures for integration tests: deterministic stores, request
//! builders, an invariant checker, and a fault-injecting store wrapper used
//! to simulate crashes mid-mutation-sequence.

use idlink_rs::{
    Clock, Contact, ContactId, ContactStore, ContactUpdate, IdentifyRequest, LinkPrecedence,
    MemoryStore, NewContact, StoreError, StoreMetrics,
};
use std::cell::Cell;
use std::rc::Rc;

/// A store with a deterministic logical clock (1s steps starting at 1s).
#[allow(dead_code)]
pub fn deterministic_store() -> MemoryStore {
    MemoryStore::with_clock(Clock::logical(1_000, 1_000))
}

#[allow(dead_code)]
pub fn request(email: Option<&str>, phone: Option<&str>) -> IdentifyRequest {
    IdentifyRequest::new(email, phone)
}

/// Assert the chain invariants over every contact in the store:
/// primaries carry no link, secondaries resolve to a primary, and each
/// primary is at least as old as everything linked to it.
#[allow(dead_code)]
pub fn assert_chain_integrity(store: &dyn ContactStore) {
    let contacts = store.all_contacts().expect("store readable");
    for contact in &contacts {
        match contact.link_precedence {
            LinkPrecedence::Primary => {
                assert!(
                    contact.linked_id.is_none(),
                    "{} is primary but carries a linked_id",
                    contact.id
                );
            }
            LinkPrecedence::Secondary => {
                let root_id = contact
                    .linked_id
                    .unwrap_or_else(|| panic!("{} is secondary without a linked_id", contact.id));
                let root = store
                    .get_by_id(root_id)
                    .expect("store readable")
                    .unwrap_or_else(|| panic!("{} links to missing {}", contact.id, root_id));
                assert!(
                    root.is_primary(),
                    "{} links to {} which is not primary",
                    contact.id,
                    root_id
                );
                assert!(
                    (root.created_at, root.id) <= (contact.created_at, contact.id),
                    "{} is older than its primary {}",
                    contact.id,
                    root_id
                );
            }
        }
        assert!(
            contact.email.is_some() || contact.phone_number.is_some(),
            "{} carries neither email nor phone",
            contact.id
        );
    }
}

/// Store wrapper that fails every write after a budget is exhausted.
///
/// Reads always succeed; this models a process crash between the individual
/// steps of a mutation sequence. The budget is controlled through a
/// [`FaultHandle`] so tests keep a grip on it after the reconciler takes
/// ownership of the store.
#[allow(dead_code)]
pub struct FaultyStore {
    inner: MemoryStore,
    writes_left: FaultHandle,
}

/// Shared control over a [`FaultyStore`]'s write budget.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FaultHandle(Rc<Cell<Option<u64>>>);

#[allow(dead_code)]
impl FaultHandle {
    /// Allow `budget` more writes, then fail each subsequent one.
    pub fn fail_after_writes(&self, budget: u64) {
        self.0.set(Some(budget));
    }

    pub fn lift(&self) {
        self.0.set(None);
    }

    fn consume(&self) -> Result<(), StoreError> {
        match self.0.get() {
            None => Ok(()),
            Some(0) => Err(StoreError::unavailable("injected write failure")),
            Some(budget) => {
                self.0.set(Some(budget - 1));
                Ok(())
            }
        }
    }
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            writes_left: FaultHandle::default(),
        }
    }

    pub fn fault_handle(&self) -> FaultHandle {
        self.writes_left.clone()
    }

    fn consume_write_budget(&mut self) -> Result<(), StoreError> {
        self.writes_left.consume()
    }
}

impl ContactStore for FaultyStore {
    fn create(&mut self, new: NewContact) -> Result<Contact, StoreError> {
        self.consume_write_budget()?;
        self.inner.create(new)
    }

    fn get_by_id(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        self.inner.get_by_id(id)
    }

    fn update(&mut self, id: ContactId, fields: ContactUpdate) -> Result<Contact, StoreError> {
        self.consume_write_budget()?;
        self.inner.update(id, fields)
    }

    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        self.inner.find_by_email_or_phone(email, phone)
    }

    fn chain_members(&self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError> {
        self.inner.chain_members(primary_id)
    }

    fn all_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        self.inner.all_contacts()
    }

    fn metrics(&self) -> Option<StoreMetrics> {
        self.inner.metrics()
    }
}
