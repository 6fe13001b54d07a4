//! Ownership check shared by every mutating path.

use crate::error::{Error, Result};
use crate::types::{Principal, Role};

/// True when `principal` may act on a resource owned by `resource_owner_id`.
///
/// Root may act on anything. Everyone else must own the resource exactly.
#[must_use]
pub fn authorize(principal: &Principal, resource_owner_id: &str) -> bool {
    principal.role() == Role::Root || principal.owner_id() == resource_owner_id
}

pub fn require_owner(principal: &Principal, resource_owner_id: &str) -> Result<()> {
    if authorize(principal, resource_owner_id) {
        Ok(())
    } else {
        tracing::debug!(
            "Denied {} access to resource owned by {}",
            principal.owner_id(),
            resource_owner_id
        );
        Err(Error::PermissionDenied)
    }
}
