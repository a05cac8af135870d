//! The persisted active scope of each user, `user.active_family_id`.
//!
//! These are the only functions that write the column. Setting it is reserved
//! for the switch service, while other modules may only clear it.

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, auth::UserID, family::FamilyId};

/// Get the family a user has selected, or `None` for their Personal scope.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn get_active_family_id(
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<FamilyId>, Error> {
    connection
        .query_row(
            "SELECT active_family_id FROM user WHERE id = ?1",
            (user_id,),
            |row| row.get(0),
        )
        .optional()?
        .ok_or(Error::NotFound)
}

pub(super) fn set_active_family_id(
    user_id: UserID,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET active_family_id = ?1 WHERE id = ?2",
        (family_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

pub(super) fn clear_active_family_id(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET active_family_id = NULL WHERE id = ?1",
        (user_id,),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Reset a user to their Personal scope, but only if their active scope is
/// still `family_id`.
///
/// Returns whether the pointer was cleared.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub(crate) fn clear_active_family_if(
    user_id: UserID,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET active_family_id = NULL WHERE id = ?1 AND active_family_id = ?2",
        (user_id, family_id),
    )?;

    Ok(rows_affected > 0)
}
