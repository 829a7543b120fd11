//! # Store Module
//!
//! The `ContactStore` trait consumed by the reconciliation core, plus the
//! in-memory reference implementation. The store is a plain key-value surface:
//! no uniqueness constraints, no multi-record transactions. Matching is kept
//! sublinear by maintaining two equality indexes (email, phone) instead of a
//! predicate scan.

use crate::clock::Clock;
use crate::error::StoreError;
use crate::model::{Contact, ContactId, ContactUpdate, NewContact};
use hashbrown::HashMap;
use rustc_hash::FxHashMap;
use std::cell::Cell;

/// Read/write counters for a store. Snapshots are cheap copies; tests use the
/// write count to assert that no-op identifies stay read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub reads: u64,
    pub writes: u64,
}

/// Abstract contact persistence consumed by the reconciliation core.
///
/// Implementations assign ids and timestamps at creation. There is no
/// transactionality guarantee across calls; the core's mutation sequences are
/// designed so that any prefix of them is a valid store state.
pub trait ContactStore {
    /// Create a contact from the given fields, assigning id and timestamps.
    fn create(&mut self, new: NewContact) -> Result<Contact, StoreError>;

    /// Point-read by id. `Ok(None)` means the id does not exist.
    fn get_by_id(&self, id: ContactId) -> Result<Option<Contact>, StoreError>;

    /// Update link fields of an existing contact, refreshing `updated_at`.
    fn update(&mut self, id: ContactId, fields: ContactUpdate) -> Result<Contact, StoreError>;

    /// All contacts whose email equals `email` OR whose phone equals `phone`,
    /// whichever of the two is given. Ordered by ascending id.
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError>;

    /// The primary with the given id plus every secondary pointing at it.
    fn chain_members(&self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError>;

    /// Every contact in the store, ordered by ascending id. Used for
    /// diagnostics and invariant checks, not by the identify flow.
    fn all_contacts(&self) -> Result<Vec<Contact>, StoreError>;

    /// Read/write counters, if the implementation tracks them.
    fn metrics(&self) -> Option<StoreMetrics> {
        None
    }
}

/// In-memory contact store with equality indexes on email and phone.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    contacts: HashMap<ContactId, Contact>,
    email_index: FxHashMap<String, Vec<ContactId>>,
    phone_index: FxHashMap<String, Vec<ContactId>>,
    next_id: u64,
    clock: Clock,
    reads: Cell<u64>,
    writes: Cell<u64>,
}

impl MemoryStore {
    /// Create a new store stamping wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Clock::Wall)
    }

    /// Create a new store with an explicit timestamp source.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            contacts: HashMap::new(),
            email_index: FxHashMap::default(),
            phone_index: FxHashMap::default(),
            next_id: 1,
            clock,
            reads: Cell::new(0),
            writes: Cell::new(0),
        }
    }

    /// Insert a fully formed contact, keeping indexes and the id counter in
    /// sync. Used for restores and test seeding; not counted as a write.
    pub fn insert_contact(&mut self, contact: Contact) {
        self.index_contact(&contact);
        self.next_id = self.next_id.max(contact.id.0 + 1);
        self.contacts.insert(contact.id, contact);
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    fn index_contact(&mut self, contact: &Contact) {
        if let Some(email) = &contact.email {
            let ids = self.email_index.entry(email.clone()).or_default();
            if !ids.contains(&contact.id) {
                ids.push(contact.id);
            }
        }
        if let Some(phone) = &contact.phone_number {
            let ids = self.phone_index.entry(phone.clone()).or_default();
            if !ids.contains(&contact.id) {
                ids.push(contact.id);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactStore for MemoryStore {
    fn create(&mut self, new: NewContact) -> Result<Contact, StoreError> {
        let now = self.clock.tick();
        let contact = Contact {
            id: ContactId(self.next_id),
            email: new.email,
            phone_number: new.phone_number,
            link_precedence: new.link_precedence,
            linked_id: new.linked_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.next_id += 1;
        self.index_contact(&contact);
        self.contacts.insert(contact.id, contact.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(contact)
    }

    fn get_by_id(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.contacts.get(&id).cloned())
    }

    fn update(&mut self, id: ContactId, fields: ContactUpdate) -> Result<Contact, StoreError> {
        let now = self.clock.tick();
        let contact = self
            .contacts
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if let Some(precedence) = fields.link_precedence {
            contact.link_precedence = precedence;
        }
        if let Some(linked_id) = fields.linked_id {
            contact.linked_id = Some(linked_id);
        }
        contact.updated_at = now;
        let updated = contact.clone();
        self.writes.set(self.writes.get() + 1);
        Ok(updated)
    }

    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        self.reads.set(self.reads.get() + 1);
        let mut ids: Vec<ContactId> = Vec::new();
        if let Some(email) = email {
            if let Some(matched) = self.email_index.get(email) {
                ids.extend(matched);
            }
        }
        if let Some(phone) = phone {
            if let Some(matched) = self.phone_index.get(phone) {
                ids.extend(matched);
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.contacts.get(&id).cloned())
            .collect())
    }

    fn chain_members(&self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError> {
        self.reads.set(self.reads.get() + 1);
        let mut members: Vec<Contact> = self
            .contacts
            .values()
            .filter(|contact| contact.id == primary_id || contact.linked_id == Some(primary_id))
            .cloned()
            .collect();
        members.sort_by_key(|contact| contact.id);
        Ok(members)
    }

    fn all_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        self.reads.set(self.reads.get() + 1);
        let mut contacts: Vec<Contact> = self.contacts.values().cloned().collect();
        contacts.sort_by_key(|contact| contact.id);
        Ok(contacts)
    }

    fn metrics(&self) -> Option<StoreMetrics> {
        Some(StoreMetrics {
            reads: self.reads.get(),
            writes: self.writes.get(),
        })
    }
}
