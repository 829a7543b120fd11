//! # Error Taxonomy
//!
//! Typed failures surfaced by the reconciliation core. The core never aborts
//! the process; every failure is returned to the caller, and retry policy (if
//! any) belongs to the transport layer in front of it.

use crate::model::ContactId;
use thiserror::Error;

/// Failures from the contact store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A read or write to the persistence layer failed (network, throttling,
    /// malformed response). Not retried by the core.
    #[error("contact store unavailable: {reason}")]
    Unavailable { reason: String },

    /// An update targeted a contact that does not exist.
    #[error("contact not found: {0}")]
    NotFound(ContactId),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Failures of a single identify operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Neither email nor phone number was supplied. Reported before any
    /// store access.
    #[error("invalid request: at least one of email or phoneNumber is required")]
    InvalidRequest,

    /// The persistence layer failed mid-operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A chain link could not be resolved: a secondary pointing at a missing
    /// or non-primary record, or a chain root that vanished between steps.
    /// Fatal for the request; never silently patched.
    #[error("chain integrity fault: {context}")]
    IntegrityFault { context: String },
}

impl ReconcileError {
    pub fn integrity(context: impl Into<String>) -> Self {
        ReconcileError::IntegrityFault {
            context: context.into(),
        }
    }
}
