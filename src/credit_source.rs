//! Credit cards and other lines of credit that transactions can be paid with.

use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseId, Error,
    auth::UserID,
    family::FamilyId,
    gateway::{EntityKind, ScopedEntity},
};

/// The client-writable part of a [CreditSource].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSourceFields {
    pub card_name: String,
    /// The last four digits of the card number.
    #[serde(default)]
    pub card_last4: Option<String>,
    pub credit_limit: f64,
    /// The day of the month the statement is generated.
    pub billing_day: u8,
    /// The day of the month the payment is due.
    pub due_day: u8,
}

/// A card or line of credit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditSource {
    pub id: DatabaseId,
    pub owner_id: UserID,
    pub family_id: Option<FamilyId>,
    #[serde(flatten)]
    pub fields: CreditSourceFields,
}

fn validate_day(label: &str, day: u8) -> Result<(), String> {
    if (1..=31).contains(&day) {
        Ok(())
    } else {
        Err(format!("{label} must be a day of the month, got {day}"))
    }
}

impl ScopedEntity for CreditSource {
    type Fields = CreditSourceFields;

    const KIND: EntityKind = EntityKind::CreditSource;

    const FIELD_COLUMNS: &'static [&'static str] =
        &["card_name", "card_last4", "credit_limit", "billing_day", "due_day"];

    const ORDER_BY: &'static str = "card_name ASC, id ASC";

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
        Ok(CreditSourceFields {
            card_name: row.get(offset)?,
            card_last4: row.get(offset + 1)?,
            credit_limit: row.get(offset + 2)?,
            billing_day: row.get(offset + 3)?,
            due_day: row.get(offset + 4)?,
        })
    }

    fn field_values(fields: &Self::Fields) -> Vec<&dyn ToSql> {
        vec![
            &fields.card_name,
            &fields.card_last4,
            &fields.credit_limit,
            &fields.billing_day,
            &fields.due_day,
        ]
    }

    fn validate(fields: &Self::Fields) -> Result<(), String> {
        if fields.card_name.trim().is_empty() {
            return Err("card name cannot be empty".to_owned());
        }

        if let Some(last4) = &fields.card_last4
            && (last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(format!("card_last4 must be exactly four digits, got {last4:?}"));
        }

        if !fields.credit_limit.is_finite() || fields.credit_limit <= 0.0 {
            return Err(format!(
                "credit limit must be greater than zero, got {}",
                fields.credit_limit
            ));
        }

        validate_day("billing day", fields.billing_day)?;
        validate_day("due day", fields.due_day)
    }
}

/// Create the credit source table.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_credit_source_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS credit_source (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                family_id INTEGER,
                card_name TEXT NOT NULL,
                card_last4 TEXT,
                credit_limit REAL NOT NULL,
                billing_day INTEGER NOT NULL,
                due_day INTEGER NOT NULL,
                FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_credit_source_scope ON credit_source(family_id, owner_id)",
        (),
    )?;

    Ok(())
}
