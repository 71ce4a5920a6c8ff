use tracing::warn;
use uuid::Uuid;

use crate::{auth::repo_types::User, error::AppError};

/// Ownership gate: only the creator of a resource may mutate or delete it.
/// There is no administrator override.
pub fn require_owner(actor: &User, owner_id: Uuid) -> Result<(), AppError> {
    if actor.id == owner_id {
        return Ok(());
    }
    warn!(actor_id = %actor.id, %owner_id, "ownership check failed");
    Err(AppError::forbidden("Only the owner may modify this resource"))
}
