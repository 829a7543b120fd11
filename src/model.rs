//! # Data Model
//!
//! Core data structures for contact identity reconciliation: contact records,
//! link precedence, the identify request/response payloads, and the domain
//! events emitted by reconciliation.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier for contact records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub u64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Position of a contact record within its link chain.
///
/// A chain is exactly one level deep: a primary with zero or more secondaries
/// pointing at it. A record is never promoted from secondary back to primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkPrecedence::Primary => write!(f, "primary"),
            LinkPrecedence::Secondary => write!(f, "secondary"),
        }
    }
}

/// A stored contact record.
///
/// At least one of `email`/`phone_number` is always present. `linked_id` is
/// present if and only if the record is secondary, and must reference a
/// primary. `created_at` is immutable and is the sole ordering key for
/// primacy decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link_precedence: LinkPrecedence,
    pub linked_id: Option<ContactId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Contact {
    /// The id of the chain this record belongs to: itself if primary,
    /// otherwise its linked primary.
    pub fn chain_root(&self) -> ContactId {
        match self.link_precedence {
            LinkPrecedence::Primary => self.id,
            LinkPrecedence::Secondary => self.linked_id.unwrap_or(self.id),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }
}

/// Fields supplied when creating a contact. The store assigns the id and
/// timestamps; emptiness of either field is preserved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link_precedence: LinkPrecedence,
    pub linked_id: Option<ContactId>,
}

impl NewContact {
    /// A new primary carrying exactly the given fields.
    pub fn primary(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email,
            phone_number,
            link_precedence: LinkPrecedence::Primary,
            linked_id: None,
        }
    }

    /// A new secondary linked to the given primary.
    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        linked_id: ContactId,
    ) -> Self {
        Self {
            email,
            phone_number,
            link_precedence: LinkPrecedence::Secondary,
            linked_id: Some(linked_id),
        }
    }
}

/// Mutable fields of a contact. Reconciliation only ever demotes and
/// re-points; everything else is immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub link_precedence: Option<LinkPrecedence>,
    pub linked_id: Option<ContactId>,
}

impl ContactUpdate {
    /// Demote a primary into the chain rooted at `root`.
    pub fn demote_to(root: ContactId) -> Self {
        Self {
            link_precedence: Some(LinkPrecedence::Secondary),
            linked_id: Some(root),
        }
    }

    /// Re-point an existing secondary at a new chain root.
    pub fn repoint_to(root: ContactId) -> Self {
        Self {
            link_precedence: None,
            linked_id: Some(root),
        }
    }
}

/// An identify request: at least one of the two fields must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    pub fn new(email: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            email: email.map(str::to_string),
            phone_number: phone_number.map(str::to_string),
        }
    }

    /// True when neither field is supplied (an invalid request).
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone_number.is_none()
    }
}

/// The consolidated, externally visible view of a chain.
///
/// `emails[0]` and `phone_numbers[0]`, when present, always originate from
/// the primary record; secondaries follow in ascending creation order, with
/// first-occurrence dedup (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

/// Domain events emitted by reconciliation.
///
/// The core never publishes these itself; it returns them from each operation
/// and the caller decides how to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum DomainEvent {
    ContactCreated {
        contact: ContactId,
        link_precedence: LinkPrecedence,
    },
    ContactMerged {
        absorbed_root: ContactId,
        into_root: ContactId,
    },
}
