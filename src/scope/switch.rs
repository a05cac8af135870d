//! Changing a user's active scope.

use rusqlite::Transaction;

use crate::{
    Error,
    auth::UserID,
    family::{FamilyId, get_family, require_member},
    scope::{
        EffectiveScope,
        store::{clear_active_family_id, set_active_family_id},
    },
};

/// Make `family_id` the active scope of `user_id`.
///
/// Membership is read and the pointer written inside `transaction`, so the
/// user never ends up pointing at a family they do not belong to. Switching
/// to the family that is already active succeeds without changes.
///
/// # Errors
///
/// Returns [Error::FamilyNotFound] if the family does not exist and
/// [Error::NotMember] if the user is not one of its members. The active scope
/// is unchanged on error.
pub fn switch_to_family(
    user_id: UserID,
    family_id: FamilyId,
    transaction: &Transaction,
) -> Result<EffectiveScope, Error> {
    get_family(family_id, transaction)?;
    require_member(family_id, user_id, transaction)?;

    set_active_family_id(user_id, family_id, transaction)?;
    tracing::info!("User {user_id} switched to family {family_id}");

    Ok(EffectiveScope::Family(family_id))
}

/// Make Personal the active scope of `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn switch_to_personal(
    user_id: UserID,
    transaction: &Transaction,
) -> Result<EffectiveScope, Error> {
    clear_active_family_id(user_id, transaction)?;
    tracing::info!("User {user_id} switched to Personal");

    Ok(EffectiveScope::Personal)
}
