//! Copies a user's Personal records into a family.
//!
//! Each kind of record is copied inside its own savepoint. A kind that fails
//! is rolled back on its own and reported, while the kinds copied before it
//! are kept. References between records are pointed at the copies, so a
//! transaction copied along with its category refers to the family's copy of
//! the category. A reference to a record that was not copied is cleared.

use std::collections::BTreeMap;

use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    auth::UserID,
    budget::Budget,
    category::Category,
    credit_source::CreditSource,
    family::FamilyId,
    gateway::{CopyMap, EntityKind, ScopedEntity, query},
    scope::{EffectiveScope, RequestScope},
    transaction::Transaction as LedgerTransaction,
};

/// Which Personal records to copy into a family.
///
/// The date range applies to transactions only. Both ends are inclusive and
/// either may be left open.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportSelection {
    #[serde(default)]
    pub transactions: bool,
    #[serde(default)]
    pub budgets: bool,
    #[serde(default)]
    pub credit_sources: bool,
    #[serde(default)]
    pub categories: bool,
    #[serde(default)]
    pub from_date: Option<Date>,
    #[serde(default)]
    pub to_date: Option<Date>,
}

impl ImportSelection {
    fn includes(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Category => self.categories,
            EntityKind::CreditSource => self.credit_sources,
            EntityKind::Budget => self.budgets,
            EntityKind::Transaction => self.transactions,
        }
    }
}

/// A kind of record that could not be copied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    pub kind: EntityKind,
    pub reason: String,
}

/// The outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// The number of records copied for each selected kind that succeeded.
    pub copied: BTreeMap<EntityKind, usize>,
    pub failed: Vec<ImportFailure>,
}

/// Copy the Personal records of `user_id` selected by `selection` into `family_id`.
///
/// The originals are left untouched. The caller must have checked that the
/// user is a member of the family.
///
/// # Errors
///
/// Returns an error only if a savepoint could not be opened or released. A
/// kind that fails to copy is recorded in the report instead.
pub fn import_personal_data(
    user_id: UserID,
    family_id: FamilyId,
    selection: &ImportSelection,
    transaction: &mut Transaction<'_>,
) -> Result<ImportReport, Error> {
    let mut report = ImportReport::default();
    let mut copies = CopyMap::new();

    copy_kind::<Category>(user_id, family_id, selection, &mut copies, &mut report, transaction)?;
    copy_kind::<CreditSource>(user_id, family_id, selection, &mut copies, &mut report, transaction)?;
    copy_kind::<Budget>(user_id, family_id, selection, &mut copies, &mut report, transaction)?;
    copy_kind::<LedgerTransaction>(
        user_id,
        family_id,
        selection,
        &mut copies,
        &mut report,
        transaction,
    )?;

    tracing::info!(
        "User {user_id} imported into family {family_id}: copied {:?}, {} kinds failed",
        report.copied,
        report.failed.len()
    );

    Ok(report)
}

fn copy_kind<E: ScopedEntity>(
    user_id: UserID,
    family_id: FamilyId,
    selection: &ImportSelection,
    copies: &mut CopyMap,
    report: &mut ImportReport,
    transaction: &mut Transaction<'_>,
) -> Result<(), Error> {
    if !selection.includes(E::KIND) {
        return Ok(());
    }

    // Dropping the savepoint without committing rolls it back.
    let savepoint = transaction.savepoint()?;

    match copy_records::<E>(user_id, family_id, selection, copies, &savepoint) {
        Ok(new_copies) => {
            savepoint.commit()?;
            report.copied.insert(E::KIND, new_copies.len());
            copies.extend(new_copies);
        }
        Err(error) => {
            tracing::warn!("Could not import {} for user {user_id}: {error}", E::KIND);
            let reason = match error {
                Error::InvalidEntity(..) | Error::InvalidReference(..) => error.to_string(),
                _ => format!("could not copy {} records", E::KIND),
            };
            report.failed.push(ImportFailure {
                kind: E::KIND,
                reason,
            });
        }
    }

    Ok(())
}

fn copy_records<E: ScopedEntity>(
    user_id: UserID,
    family_id: FamilyId,
    selection: &ImportSelection,
    copies: &CopyMap,
    connection: &Connection,
) -> Result<CopyMap, Error> {
    let personal = RequestScope {
        user_id,
        scope: EffectiveScope::Personal,
    };
    let mut new_copies = CopyMap::new();

    for original in query::list::<E>(&personal, connection)? {
        if !E::in_date_range(original.fields(), selection.from_date, selection.to_date) {
            continue;
        }

        E::validate(original.fields()).map_err(|reason| {
            Error::InvalidEntity(E::KIND, format!("record {}: {reason}", original.id()))
        })?;

        let mut fields = original.fields().clone();
        E::remap_references(&mut fields, copies);

        let mut copy = E::from_parts(original.id(), original.owner(), None, fields);
        copy.set_family_id(Some(family_id));
        let copy = query::insert(&copy, connection)?;

        new_copies.insert((E::KIND, original.id()), copy.id());
    }

    Ok(new_copies)
}
