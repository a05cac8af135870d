//! The capability trait every scoped record type implements.

use std::{collections::HashMap, fmt::Display};

use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::Date;

use crate::{DatabaseId, auth::UserID, family::FamilyId};

/// The kinds of scoped records.
///
/// The order of the variants is the order records are copied in during an
/// import, so that references can be remapped to copies made earlier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    CreditSource,
    Budget,
    Transaction,
}

impl EntityKind {
    /// The table the records are stored in, quoted where the name is an SQL keyword.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::CreditSource => "credit_source",
            EntityKind::Budget => "budget",
            EntityKind::Transaction => "\"transaction\"",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Category => "category",
            EntityKind::CreditSource => "credit source",
            EntityKind::Budget => "budget",
            EntityKind::Transaction => "transaction",
        };

        f.write_str(name)
    }
}

/// Maps the ID of an original record to the ID of its copy.
pub type CopyMap = HashMap<(EntityKind, DatabaseId), DatabaseId>;

/// A record that lives in exactly one scope.
///
/// Every type stores `id`, `owner_id` and `family_id` columns followed by its
/// own [ScopedEntity::FIELD_COLUMNS]. A `NULL` family means the owner's
/// Personal scope. Clients only ever send [ScopedEntity::Fields], so they can
/// never choose the owner or the family of a record.
pub trait ScopedEntity: Sized + Serialize + Send + 'static {
    /// The client-writable part of the record.
    type Fields: Clone + DeserializeOwned + Send + 'static;

    /// Which kind of record this is.
    const KIND: EntityKind;

    /// The columns of [ScopedEntity::Fields], in the order of [ScopedEntity::field_values].
    const FIELD_COLUMNS: &'static [&'static str];

    /// The `ORDER BY` clause used when listing records.
    const ORDER_BY: &'static str = "id ASC";

    /// Assemble a record from its stored parts.
    fn from_parts(
        id: DatabaseId,
        owner_id: UserID,
        family_id: Option<FamilyId>,
        fields: Self::Fields,
    ) -> Self;

    fn id(&self) -> DatabaseId;

    fn owner(&self) -> UserID;

    fn family_id(&self) -> Option<FamilyId>;

    fn set_family_id(&mut self, family_id: Option<FamilyId>);

    fn fields(&self) -> &Self::Fields;

    /// Read the field columns of `row`, starting at column `offset`.
    fn map_fields(row: &Row, offset: usize) -> Result<Self::Fields, rusqlite::Error>;

    /// The SQL values of `fields`, in the order of [ScopedEntity::FIELD_COLUMNS].
    fn field_values(fields: &Self::Fields) -> Vec<&dyn ToSql>;

    /// Check `fields` before they are written.
    ///
    /// Returns a description of the first problem found.
    fn validate(_fields: &Self::Fields) -> Result<(), String> {
        Ok(())
    }

    /// The other records `fields` refers to.
    fn references(_fields: &Self::Fields) -> Vec<(EntityKind, DatabaseId)> {
        Vec::new()
    }

    /// Point the references in `fields` at the copies in `copies`.
    ///
    /// References to records that were not copied are removed.
    fn remap_references(_fields: &mut Self::Fields, _copies: &CopyMap) {}

    /// Whether the record falls within the optional import date range.
    fn in_date_range(_fields: &Self::Fields, _from: Option<Date>, _to: Option<Date>) -> bool {
        true
    }
}

/// Look up the copy of a referenced record, `None` if it was not copied.
pub fn remap(
    reference: Option<DatabaseId>,
    kind: EntityKind,
    copies: &CopyMap,
) -> Option<DatabaseId> {
    reference.and_then(|id| copies.get(&(kind, id)).copied())
}
