//! Database setup and the helpers shared by every module that talks to SQLite.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    auth::create_user_table,
    budget::create_budget_table,
    category::create_category_table,
    credit_source::create_credit_source_table,
    family::{create_family_table, create_family_member_table, create_invite_table},
    transaction::create_transaction_table,
};

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// Create all of the application's tables.
///
/// Foreign key enforcement is switched on for `connection` first, since SQLite
/// ignores that pragma inside a transaction.
///
/// # Errors
/// Returns an error if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_family_table(&transaction)?;
    create_family_member_table(&transaction)?;
    create_invite_table(&transaction)?;
    create_category_table(&transaction)?;
    create_credit_source_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Acquire the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the mutex was poisoned.
pub(crate) fn lock(
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Start a `BEGIN IMMEDIATE` transaction on `connection`.
///
/// The write lock is taken up front so that reading the caller's scope and
/// writing scoped rows happen against the same snapshot.
///
/// # Errors
/// Returns an error if SQLite could not start the transaction.
pub(crate) fn begin(connection: &Connection) -> Result<Transaction<'_>, Error> {
    Transaction::new_unchecked(connection, TransactionBehavior::Immediate).map_err(Error::from)
}

/// Run `operation` in one immediate transaction on the shared connection.
///
/// The transaction is committed when `operation` succeeds and rolled back
/// when it returns an error.
///
/// # Errors
///
/// Returns the error of `operation`, or an error if the lock could not be
/// acquired or the transaction could not be started or committed.
pub(crate) fn in_transaction<T>(
    db_connection: &Arc<Mutex<Connection>>,
    operation: impl FnOnce(&mut Transaction<'_>) -> Result<T, Error>,
) -> Result<T, Error> {
    let connection = lock(db_connection)?;
    let mut transaction = begin(&connection)?;

    let result = operation(&mut transaction)?;
    transaction.commit()?;

    Ok(result)
}
