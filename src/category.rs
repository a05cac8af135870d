//! Categories group transactions, e.g. "Groceries" or "Salary".

use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseId, Error,
    auth::UserID,
    family::FamilyId,
    gateway::{EntityKind, ScopedEntity},
    transaction::EntryType,
};

/// The client-writable part of a [Category].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFields {
    pub name: String,
    /// Whether the category is for income or expenses.
    pub category_type: EntryType,
}

/// A named group of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: DatabaseId,
    pub owner_id: UserID,
    pub family_id: Option<FamilyId>,
    #[serde(flatten)]
    pub fields: CategoryFields,
}

impl ScopedEntity for Category {
    type Fields = CategoryFields;

    const KIND: EntityKind = EntityKind::Category;

    const FIELD_COLUMNS: &'static [&'static str] = &["name", "category_type"];

    const ORDER_BY: &'static str = "name ASC, id ASC";

    fn from_parts(
        id: DatabaseId,
        owner_id: UserID,
        family_id: Option<FamilyId>,
        fields: Self::Fields,
    ) -> Self {
        Self {
            id,
            owner_id,
            family_id,
            fields,
        }
    }

    fn id(&self) -> DatabaseId {
        self.id
    }

    fn owner(&self) -> UserID {
        self.owner_id
    }

    fn family_id(&self) -> Option<FamilyId> {
        self.family_id
    }

    fn set_family_id(&mut self, family_id: Option<FamilyId>) {
        self.family_id = family_id;
    }

    fn fields(&self) -> &Self::Fields {
        &self.fields
    }

    fn map_fields(row: &Row, offset: usize) -> Result<Self::Fields, rusqlite::Error> {
        Ok(CategoryFields {
            name: row.get(offset)?,
            category_type: row.get(offset + 1)?,
        })
    }

    fn field_values(fields: &Self::Fields) -> Vec<&dyn ToSql> {
        vec![&fields.name, &fields.category_type]
    }

    fn validate(fields: &Self::Fields) -> Result<(), String> {
        if fields.name.trim().is_empty() {
            Err("name cannot be empty".to_owned())
        } else {
            Ok(())
        }
    }
}

/// Create the category table.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_category_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                family_id INTEGER,
                name TEXT NOT NULL,
                category_type TEXT NOT NULL,
                FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_scope ON category(family_id, owner_id)",
        (),
    )?;

    Ok(())
}
