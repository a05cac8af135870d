//! The membership registry: which users belong to which families, and with what role.

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    family::{FamilyId, FamilySummary, Member, Role},
    scope::clear_active_family_if,
};

/// Create the family member table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_family_member_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS family_member (
                id INTEGER PRIMARY KEY,
                family_id INTEGER NOT NULL REFERENCES family(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
                joined_at TEXT NOT NULL,
                UNIQUE (family_id, user_id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_family_member_user ON family_member(user_id)",
        (),
    )?;

    Ok(())
}

/// Add `user_id` to a family with `role`.
///
/// # Errors
///
/// Returns [Error::AlreadyMember] if the user already belongs to the family.
pub fn add_member(
    family_id: FamilyId,
    user_id: UserID,
    role: Role,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO family_member (family_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        (family_id, user_id, role, OffsetDateTime::now_utc()),
    )?;

    Ok(())
}

/// Get the role of `user_id` in a family, `None` if they are not a member.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_role(
    family_id: FamilyId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<Role>, Error> {
    connection
        .query_row(
            "SELECT role FROM family_member WHERE family_id = ?1 AND user_id = ?2",
            (family_id, user_id),
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
}

/// Whether `user_id` is currently a member of the family.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn is_member(family_id: FamilyId, user_id: UserID, connection: &Connection) -> Result<bool, Error> {
    get_role(family_id, user_id, connection).map(|role| role.is_some())
}

/// Get the role of a member.
///
/// # Errors
///
/// Returns [Error::NotMember] if `user_id` is not a member of the family.
pub fn require_member(
    family_id: FamilyId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Role, Error> {
    get_role(family_id, user_id, connection)?.ok_or(Error::NotMember)
}

/// Check that `user_id` is an admin of the family.
///
/// # Errors
///
/// Returns [Error::NotMember] if the user is not in the family and
/// [Error::NotAdmin] if they are an ordinary member.
pub fn require_admin(
    family_id: FamilyId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    match require_member(family_id, user_id, connection)? {
        Role::Admin => Ok(()),
        Role::Member => Err(Error::NotAdmin),
    }
}

fn count_admins(family_id: FamilyId, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM family_member WHERE family_id = ?1 AND role = 'admin'",
            (family_id,),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// List the members of a family in the order they joined.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_members(family_id: FamilyId, connection: &Connection) -> Result<Vec<Member>, Error> {
    connection
        .prepare(
            "SELECT family_member.user_id, user.email, family_member.role, family_member.joined_at
            FROM family_member
            INNER JOIN user ON user.id = family_member.user_id
            WHERE family_member.family_id = ?1
            ORDER BY family_member.joined_at ASC, family_member.id ASC",
        )?
        .query_map((family_id,), |row| {
            Ok(Member {
                user_id: row.get(0)?,
                email: row.get(1)?,
                role: row.get(2)?,
                joined_at: row.get(3)?,
            })
        })?
        .map(|maybe_member| maybe_member.map_err(Error::from))
        .collect()
}

/// List the families `user_id` belongs to, ordered by name then ID.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_families_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<FamilySummary>, Error> {
    connection
        .prepare(
            "SELECT family.id, family.name,
                (SELECT COUNT(*) FROM family_member AS m WHERE m.family_id = family.id)
            FROM family
            INNER JOIN family_member ON family_member.family_id = family.id
            WHERE family_member.user_id = ?1
            ORDER BY family.name ASC, family.id ASC",
        )?
        .query_map((user_id,), |row| {
            Ok(FamilySummary {
                id: row.get(0)?,
                name: row.get(1)?,
                member_count: row.get(2)?,
            })
        })?
        .map(|maybe_summary| maybe_summary.map_err(Error::from))
        .collect()
}

/// Change the role of a member.
///
/// # Errors
///
/// Returns [Error::NotMember] if `user_id` is not in the family and
/// [Error::LastAdmin] if it would demote the family's only admin.
pub fn set_role(
    family_id: FamilyId,
    user_id: UserID,
    role: Role,
    connection: &Connection,
) -> Result<(), Error> {
    let current_role = require_member(family_id, user_id, connection)?;

    if current_role == Role::Admin && role == Role::Member && count_admins(family_id, connection)? <= 1
    {
        return Err(Error::LastAdmin);
    }

    connection.execute(
        "UPDATE family_member SET role = ?1 WHERE family_id = ?2 AND user_id = ?3",
        (role, family_id, user_id),
    )?;

    Ok(())
}

/// Remove `user_id` from a family.
///
/// If the user's active scope is the family they are moved back to Personal
/// in the same transaction.
///
/// # Errors
///
/// Returns [Error::NotMember] if `user_id` is not in the family and
/// [Error::LastAdmin] if they are the family's only admin. A family whose
/// only member wants to leave should be deleted instead.
pub fn remove_member(
    family_id: FamilyId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let role = require_member(family_id, user_id, connection)?;

    if role == Role::Admin && count_admins(family_id, connection)? <= 1 {
        return Err(Error::LastAdmin);
    }

    connection.execute(
        "DELETE FROM family_member WHERE family_id = ?1 AND user_id = ?2",
        (family_id, user_id),
    )?;

    if clear_active_family_if(user_id, family_id, connection)? {
        tracing::info!("Reset user {user_id} to Personal after leaving family {family_id}");
    }

    Ok(())
}
