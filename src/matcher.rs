//! # Matcher Module
//!
//! Retrieves every stored contact that shares the request's email or phone
//! number. Read-only; an empty request is rejected before any store access.

use crate::error::ReconcileError;
use crate::model::{Contact, IdentifyRequest};
use crate::store::ContactStore;

/// Find all contacts matching the request by email OR phone.
pub fn find_candidates(
    store: &dyn ContactStore,
    request: &IdentifyRequest,
) -> Result<Vec<Contact>, ReconcileError> {
    if request.is_empty() {
        return Err(ReconcileError::InvalidRequest);
    }
    let matched =
        store.find_by_email_or_phone(request.email.as_deref(), request.phone_number.as_deref())?;
    Ok(matched)
}
