//! Works out which scope a request runs in.

use rusqlite::Connection;

use crate::{
    Error,
    auth::UserID,
    family::{get_family, is_member, list_families_for_user},
    scope::{
        EffectiveScope, RequestScope, ScopeView, SwitchTargets,
        store::{clear_active_family_if, get_active_family_id},
    },
};

/// Get the effective scope of `user_id`.
///
/// A user whose active family no longer lists them as a member is treated as
/// Personal and their stored pointer is cleared. The clear only applies if the
/// pointer still holds the stale family, so a concurrent switch is kept.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn resolve(user_id: UserID, connection: &Connection) -> Result<EffectiveScope, Error> {
    let Some(family_id) = get_active_family_id(user_id, connection)? else {
        return Ok(EffectiveScope::Personal);
    };

    if is_member(family_id, user_id, connection)? {
        return Ok(EffectiveScope::Family(family_id));
    }

    tracing::warn!(
        "User {user_id} has active family {family_id} but is not a member, resetting to Personal"
    );
    clear_active_family_if(user_id, family_id, connection)?;

    Ok(EffectiveScope::Personal)
}

/// Resolve the scope of `user_id` for the rest of a request.
///
/// # Errors
///
/// See [resolve].
pub fn resolve_request(user_id: UserID, connection: &Connection) -> Result<RequestScope, Error> {
    Ok(RequestScope {
        user_id,
        scope: resolve(user_id, connection)?,
    })
}

/// Describe `scope` for clients, looking up the family name.
///
/// # Errors
///
/// Returns [Error::FamilyNotFound] if the family does not exist.
pub fn describe_scope(scope: EffectiveScope, connection: &Connection) -> Result<ScopeView, Error> {
    match scope {
        EffectiveScope::Personal => Ok(ScopeView::Personal),
        EffectiveScope::Family(family_id) => {
            let family = get_family(family_id, connection)?;

            Ok(ScopeView::Family {
                family_id: family.id,
                family_name: family.name,
            })
        }
    }
}

/// List where `user_id` may switch to.
///
/// Personal is always a target. The families are those the user is currently
/// a member of, ordered by name then ID.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_switch_targets(user_id: UserID, connection: &Connection) -> Result<SwitchTargets, Error> {
    Ok(SwitchTargets {
        personal: true,
        families: list_families_for_user(user_id, connection)?,
    })
}
