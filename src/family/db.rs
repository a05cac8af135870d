//! Storage for families.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    family::{Family, FamilyId, FamilyName},
};

/// Create the family table.
///
/// The `CHECK` constraint keeps the Personal scope name out of the table even
/// if a caller skips [FamilyName::new].
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_family_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS family (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_by INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                CONSTRAINT family_name_not_reserved CHECK (lower(trim(name)) <> 'personal')
                )",
        (),
    )?;

    Ok(())
}

/// Insert a family row.
///
/// This does not add the creator as a member, see `create_family`
/// for the full creation flow.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn insert_family(
    name: FamilyName,
    created_by: UserID,
    connection: &Connection,
) -> Result<Family, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO family (name, created_by, created_at) VALUES (?1, ?2, ?3)",
        (&name, created_by, created_at),
    )?;

    Ok(Family {
        id: FamilyId::new(connection.last_insert_rowid()),
        name,
        created_by,
        created_at,
    })
}

fn map_row(row: &Row) -> Result<Family, rusqlite::Error> {
    Ok(Family {
        id: row.get(0)?,
        name: row.get(1)?,
        created_by: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Get the family with `family_id`.
///
/// # Errors
///
/// Returns [Error::FamilyNotFound] if there is no such family.
pub fn get_family(family_id: FamilyId, connection: &Connection) -> Result<Family, Error> {
    connection
        .prepare("SELECT id, name, created_by, created_at FROM family WHERE id = :id")?
        .query_row(&[(":id", &family_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::FamilyNotFound,
            error => error.into(),
        })
}

/// Change the name of a family.
///
/// # Errors
///
/// Returns [Error::FamilyNotFound] if there is no such family.
pub fn rename_family(
    family_id: FamilyId,
    name: &FamilyName,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE family SET name = ?1 WHERE id = ?2",
        (name, family_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::FamilyNotFound);
    }

    Ok(())
}

/// Delete a family.
///
/// Memberships and invites are deleted with it. Records scoped to the family
/// return to their owners' Personal scope and users whose active scope was
/// the family are switched to Personal, both through `ON DELETE SET NULL`.
///
/// A transaction that referred to another member's category or credit source
/// loses that reference, since the two records end up in different Personal
/// scopes. Call this inside a transaction so both steps apply together.
///
/// # Errors
///
/// Returns [Error::FamilyNotFound] if there is no such family.
pub fn delete_family(family_id: FamilyId, connection: &Connection) -> Result<(), Error> {
    for (column, table) in [
        ("category_id", "category"),
        ("credit_source_id", "credit_source"),
    ] {
        connection.execute(
            &format!(
                "UPDATE \"transaction\" SET {column} = NULL
                WHERE family_id = ?1
                AND {column} IS NOT NULL
                AND (SELECT owner_id FROM {table} WHERE {table}.id = \"transaction\".{column})
                    <> \"transaction\".owner_id"
            ),
            (family_id,),
        )?;
    }

    let rows_affected = connection.execute("DELETE FROM family WHERE id = ?1", (family_id,))?;

    if rows_affected == 0 {
        return Err(Error::FamilyNotFound);
    }

    Ok(())
}
