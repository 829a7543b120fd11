//! # Idlink
//!
//! A contact identity reconciliation engine. Given an incoming
//! `(email?, phoneNumber?)` pair it decides whether this is a known customer,
//! a known customer with new contact information, or two previously-unrelated
//! customers proven to be the same person, and maintains a canonical
//! primary/secondary chain of contact records per customer.
//!
//! The flow for one request is strictly sequential: match candidates, group
//! them by chain, decide and apply the merge action, consolidate the winning
//! chain. Interrupted mutation sequences are valid intermediate states that
//! the next identify call converges from.

pub mod clock;
pub mod config;
pub mod consolidator;
pub mod decider;
pub mod error;
pub mod grouper;
pub mod matcher;
pub mod model;
pub mod store;

// Re-export main types for convenience
pub use clock::{Clock, Timestamp};
pub use error::{ReconcileError, StoreError};
pub use model::{
    ConsolidatedContact, Contact, ContactId, ContactUpdate, DomainEvent, IdentifyRequest,
    LinkPrecedence, NewContact,
};
pub use store::{ContactStore, MemoryStore, StoreMetrics};

/// Result of one identify operation: the consolidated view of the canonical
/// chain plus the domain events produced while reaching it. The caller owns
/// publishing the events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyOutcome {
    pub contact: ConsolidatedContact,
    pub events: Vec<DomainEvent>,
}

/// Main API for contact identity reconciliation
pub struct Reconciler {
    store: Box<dyn ContactStore>,
}

impl Reconciler {
    /// Create a new reconciler backed by an in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Create a new reconciler with a custom store implementation.
    pub fn with_store<S>(store: S) -> Self
    where
        S: ContactStore + 'static,
    {
        Self {
            store: Box::new(store),
        }
    }

    pub fn store(&self) -> &dyn ContactStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ContactStore {
        self.store.as_mut()
    }

    /// Resolve one identify request against the store.
    pub fn identify(
        &mut self,
        request: &IdentifyRequest,
    ) -> Result<IdentifyOutcome, ReconcileError> {
        let matched = matcher::find_candidates(self.store.as_ref(), request)?;
        let groups = grouper::group_by_chain(self.store.as_ref(), &matched)?;
        let action = decider::decide(request, &groups);
        let (root, events) = decider::apply(self.store.as_mut(), request, action)?;
        let contact = consolidator::consolidate(self.store.as_ref(), root)?;
        Ok(IdentifyOutcome { contact, events })
    }

    /// Read/write counters of the underlying store, if tracked.
    pub fn store_metrics(&self) -> Option<StoreMetrics> {
        self.store.metrics()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_rejects_empty_request() {
        let mut reconciler = Reconciler::new();
        let err = reconciler.identify(&IdentifyRequest::default()).unwrap_err();
        assert_eq!(err, ReconcileError::InvalidRequest);
    }

    #[test]
    fn test_identify_creates_and_reuses_primary() {
        let mut reconciler =
            Reconciler::with_store(MemoryStore::with_clock(Clock::logical(1_000, 1_000)));
        let request = IdentifyRequest::new(Some("a@x.com"), Some("111"));

        let first = reconciler.identify(&request).unwrap();
        assert_eq!(first.contact.emails, vec!["a@x.com"]);
        assert_eq!(first.events.len(), 1);

        let second = reconciler.identify(&request).unwrap();
        assert_eq!(
            second.contact.primary_contact_id,
            first.contact.primary_contact_id
        );
        assert!(second.events.is_empty());
    }
}
