//! The scoped reads and writes shared by every record type.
//!
//! Everything outside this module reaches the record tables through these
//! functions, so a record is only ever seen or changed from its own scope.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::{
    DatabaseId, Error,
    family::is_member,
    gateway::{EntityKind, ScopedEntity},
    scope::{EffectiveScope, RequestScope},
};

/// The column list shared by every select, qualified by position.
fn select_columns<E: ScopedEntity>() -> String {
    let mut columns = vec!["id", "owner_id", "family_id"];
    columns.extend_from_slice(E::FIELD_COLUMNS);

    columns.join(", ")
}

fn map_entity<E: ScopedEntity>(row: &Row) -> Result<E, rusqlite::Error> {
    Ok(E::from_parts(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        E::map_fields(row, 3)?,
    ))
}

/// The `WHERE` condition selecting the records of `scope`, and its parameter `?1`.
fn scope_condition(scope: &RequestScope) -> (&'static str, i64) {
    match scope.scope {
        EffectiveScope::Personal => ("family_id IS NULL AND owner_id = ?1", scope.user_id.as_i64()),
        EffectiveScope::Family(family_id) => ("family_id = ?1", family_id.as_i64()),
    }
}

/// List the records of kind `E` in the caller's scope.
///
/// In Personal scope these are the caller's records with no family. In a
/// family scope they are the family's records, whoever created them.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list<E: ScopedEntity>(scope: &RequestScope, connection: &Connection) -> Result<Vec<E>, Error> {
    let (condition, scope_param) = scope_condition(scope);
    let query = format!(
        "SELECT {} FROM {} WHERE {condition} ORDER BY {}",
        select_columns::<E>(),
        E::KIND.table_name(),
        E::ORDER_BY
    );

    connection
        .prepare(&query)?
        .query_map((scope_param,), map_entity::<E>)?
        .map(|maybe_entity| maybe_entity.map_err(Error::from))
        .collect()
}

/// Get one record of kind `E` from the caller's scope.
///
/// # Errors
///
/// Returns [Error::NotFound] if the record does not exist or is in another scope.
pub fn get<E: ScopedEntity>(
    id: DatabaseId,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<E, Error> {
    let (condition, scope_param) = scope_condition(scope);
    let query = format!(
        "SELECT {} FROM {} WHERE {condition} AND id = ?2",
        select_columns::<E>(),
        E::KIND.table_name(),
    );

    connection
        .prepare(&query)?
        .query_row((scope_param, id), map_entity::<E>)
        .map_err(Error::from)
}

fn get_unscoped<E: ScopedEntity>(id: DatabaseId, connection: &Connection) -> Result<E, Error> {
    let query = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        select_columns::<E>(),
        E::KIND.table_name(),
    );

    connection
        .prepare(&query)?
        .query_row((id,), map_entity::<E>)
        .map_err(Error::from)
}

/// Whether `kind` record `id` is visible in the caller's scope.
fn exists_in_scope(
    kind: EntityKind,
    id: DatabaseId,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<bool, Error> {
    let (condition, scope_param) = scope_condition(scope);
    let query = format!(
        "SELECT 1 FROM {} WHERE {condition} AND id = ?2",
        kind.table_name()
    );

    Ok(connection
        .query_row(&query, (scope_param, id), |_| Ok(()))
        .optional()?
        .is_some())
}

/// Validate `fields` and check that everything they refer to is in the caller's scope.
fn check_fields<E: ScopedEntity>(
    fields: &E::Fields,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<(), Error> {
    E::validate(fields).map_err(|reason| Error::InvalidEntity(E::KIND, reason))?;

    for (kind, id) in E::references(fields) {
        if !exists_in_scope(kind, id, scope, connection)? {
            tracing::warn!(
                "User {} referenced {kind} {id} outside of their active scope",
                scope.user_id
            );
            return Err(Error::InvalidReference(kind, id));
        }
    }

    Ok(())
}

/// Write a new row for `entity` and return it with its new ID.
///
/// The ID of `entity` is ignored.
pub(super) fn insert<E: ScopedEntity>(entity: &E, connection: &Connection) -> Result<E, Error> {
    let owner_id = entity.owner();
    let family_id = entity.family_id();
    let field_values = E::field_values(entity.fields());

    let mut values: Vec<&dyn ToSql> = vec![&owner_id, &family_id];
    values.extend(field_values);

    let placeholders = (1..=values.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "INSERT INTO {} (owner_id, family_id, {}) VALUES ({placeholders})",
        E::KIND.table_name(),
        E::FIELD_COLUMNS.join(", "),
    );

    connection.execute(&query, values.as_slice())?;

    Ok(E::from_parts(
        connection.last_insert_rowid(),
        owner_id,
        family_id,
        entity.fields().clone(),
    ))
}

/// Create a record of kind `E` in the caller's scope.
///
/// The owner is the caller and the family is taken from the caller's scope at
/// the time of the write.
///
/// # Errors
///
/// Returns an:
/// - [Error::InvalidEntity] if `fields` fail validation,
/// - [Error::InvalidReference] if `fields` refer to a record outside the scope.
pub fn create<E: ScopedEntity>(
    fields: E::Fields,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<E, Error> {
    check_fields::<E>(&fields, scope, connection)?;

    let entity = E::from_parts(0, scope.user_id, scope.scope.family_id(), fields);

    insert(&entity, connection)
}

/// Load record `id` for a write and check that it is in the caller's scope.
///
/// A record the caller could see after switching scope is a
/// [Error::ScopeMismatch]. Any other record is reported as [Error::NotFound]
/// so that its existence is not revealed.
fn get_for_write<E: ScopedEntity>(
    id: DatabaseId,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<E, Error> {
    let entity = get_unscoped::<E>(id, connection)?;

    let in_scope = match (scope.scope, entity.family_id()) {
        (EffectiveScope::Personal, None) => entity.owner() == scope.user_id,
        (EffectiveScope::Family(active), Some(family_id)) => active == family_id,
        _ => false,
    };

    if in_scope {
        return Ok(entity);
    }

    let visible_elsewhere = match entity.family_id() {
        None => entity.owner() == scope.user_id,
        Some(family_id) => is_member(family_id, scope.user_id, connection)?,
    };

    if visible_elsewhere {
        tracing::warn!(
            "User {} tried to change {} {id} from the wrong scope",
            scope.user_id,
            E::KIND
        );
        Err(Error::ScopeMismatch)
    } else {
        Err(Error::NotFound)
    }
}

/// Replace the fields of record `id`.
///
/// The owner and family of the record never change.
///
/// # Errors
///
/// Returns an:
/// - [Error::NotFound] if the caller cannot see the record in any scope,
/// - [Error::ScopeMismatch] if the record is in another of the caller's scopes,
/// - [Error::InvalidEntity] or [Error::InvalidReference] if `fields` are rejected.
pub fn update<E: ScopedEntity>(
    id: DatabaseId,
    fields: E::Fields,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<E, Error> {
    let entity = get_for_write::<E>(id, scope, connection)?;
    check_fields::<E>(&fields, scope, connection)?;

    let assignments = E::FIELD_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "UPDATE {} SET {assignments} WHERE id = ?1",
        E::KIND.table_name()
    );

    let mut values: Vec<&dyn ToSql> = vec![&id];
    values.extend(E::field_values(&fields));
    connection.execute(&query, values.as_slice())?;

    Ok(E::from_parts(id, entity.owner(), entity.family_id(), fields))
}

/// Delete record `id`.
///
/// # Errors
///
/// Returns an:
/// - [Error::NotFound] if the caller cannot see the record in any scope,
/// - [Error::ScopeMismatch] if the record is in another of the caller's scopes.
pub fn delete<E: ScopedEntity>(
    id: DatabaseId,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<(), Error> {
    get_for_write::<E>(id, scope, connection)?;

    connection.execute(
        &format!("DELETE FROM {} WHERE id = ?1", E::KIND.table_name()),
        (id,),
    )?;

    Ok(())
}

#[cfg(test)]
mod query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        auth::{PasswordHash, UserID, create_user},
        category::{Category, CategoryFields},
        db::initialize,
        family::{FamilyId, FamilyName, Role, add_member, insert_family},
        gateway::EntityKind,
        scope::{EffectiveScope, RequestScope},
        transaction::{EntryType, PaymentMethod, Transaction, TransactionFields},
    };

    use super::{create, delete, get, list, update};

    struct Fixture {
        connection: Connection,
        user: UserID,
        other: UserID,
        family: FamilyId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("a@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let other = create_user("b@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let family = insert_family(FamilyName::new_unchecked("Smiths"), user, &connection)
            .unwrap()
            .id;
        add_member(family, user, Role::Admin, &connection).unwrap();

        Fixture {
            connection,
            user,
            other,
            family,
        }
    }

    fn personal(user_id: UserID) -> RequestScope {
        RequestScope {
            user_id,
            scope: EffectiveScope::Personal,
        }
    }

    fn in_family(user_id: UserID, family_id: FamilyId) -> RequestScope {
        RequestScope {
            user_id,
            scope: EffectiveScope::Family(family_id),
        }
    }

    fn transaction_fields(amount: f64) -> TransactionFields {
        TransactionFields {
            amount,
            transaction_type: EntryType::Expense,
            payment_method: PaymentMethod::Cash,
            date: date!(2025 - 06 - 01),
            payee: Some("Grocer".to_owned()),
            notes: None,
            category_id: None,
            credit_source_id: None,
        }
    }

    #[test]
    fn create_stamps_scope_and_owner() {
        let fixture = get_fixture();

        let family_record: Transaction = create(
            transaction_fields(10.0),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        )
        .unwrap();
        let personal_record: Transaction = create(
            transaction_fields(20.0),
            &personal(fixture.user),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(family_record.family_id, Some(fixture.family));
        assert_eq!(family_record.owner_id, fixture.user);
        assert_eq!(personal_record.family_id, None);
    }

    #[test]
    fn records_are_only_listed_in_their_own_scope() {
        let fixture = get_fixture();
        let family_scope = in_family(fixture.user, fixture.family);
        let personal_scope = personal(fixture.user);
        let family_record: Transaction =
            create(transaction_fields(10.0), &family_scope, &fixture.connection).unwrap();
        let personal_record: Transaction =
            create(transaction_fields(20.0), &personal_scope, &fixture.connection).unwrap();
        create::<Transaction>(
            transaction_fields(30.0),
            &personal(fixture.other),
            &fixture.connection,
        )
        .unwrap();

        let in_family_scope: Vec<Transaction> = list(&family_scope, &fixture.connection).unwrap();
        let in_personal_scope: Vec<Transaction> =
            list(&personal_scope, &fixture.connection).unwrap();

        assert_eq!(in_family_scope, vec![family_record]);
        assert_eq!(in_personal_scope, vec![personal_record]);
    }

    #[test]
    fn family_records_are_shared_with_members() {
        let fixture = get_fixture();
        add_member(fixture.family, fixture.other, Role::Member, &fixture.connection).unwrap();
        let record: Transaction = create(
            transaction_fields(10.0),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        )
        .unwrap();

        let got: Transaction = get(
            record.id,
            &in_family(fixture.other, fixture.family),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(got, record);
    }

    #[test]
    fn get_from_other_scope_is_not_found() {
        let fixture = get_fixture();
        let record: Transaction = create(
            transaction_fields(10.0),
            &personal(fixture.user),
            &fixture.connection,
        )
        .unwrap();

        let result = get::<Transaction>(
            record.id,
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_from_wrong_scope_is_scope_mismatch_and_writes_nothing() {
        let fixture = get_fixture();
        let record: Transaction = create(
            transaction_fields(10.0),
            &personal(fixture.user),
            &fixture.connection,
        )
        .unwrap();

        let result = update::<Transaction>(
            record.id,
            transaction_fields(99.0),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::ScopeMismatch));
        let got: Transaction =
            get(record.id, &personal(fixture.user), &fixture.connection).unwrap();
        assert_eq!(got.fields.amount, 10.0);
    }

    #[test]
    fn delete_from_wrong_scope_is_scope_mismatch() {
        let fixture = get_fixture();
        let record: Transaction = create(
            transaction_fields(10.0),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        )
        .unwrap();

        let result = delete::<Transaction>(record.id, &personal(fixture.user), &fixture.connection);

        assert_eq!(result, Err(Error::ScopeMismatch));
        assert!(
            get::<Transaction>(
                record.id,
                &in_family(fixture.user, fixture.family),
                &fixture.connection
            )
            .is_ok()
        );
    }

    #[test]
    fn writes_to_strangers_records_are_not_found() {
        let fixture = get_fixture();
        let record: Transaction = create(
            transaction_fields(10.0),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        )
        .unwrap();

        let update_result = update::<Transaction>(
            record.id,
            transaction_fields(1.0),
            &personal(fixture.other),
            &fixture.connection,
        );
        let delete_result =
            delete::<Transaction>(record.id, &personal(fixture.other), &fixture.connection);

        assert_eq!(update_result, Err(Error::NotFound));
        assert_eq!(delete_result, Err(Error::NotFound));
    }

    #[test]
    fn update_in_scope_keeps_owner_and_family() {
        let fixture = get_fixture();
        let scope = in_family(fixture.user, fixture.family);
        let record: Transaction =
            create(transaction_fields(10.0), &scope, &fixture.connection).unwrap();

        let updated: Transaction = update(
            record.id,
            transaction_fields(12.5),
            &scope,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(updated.fields.amount, 12.5);
        assert_eq!(updated.family_id, Some(fixture.family));
        assert_eq!(get::<Transaction>(record.id, &scope, &fixture.connection), Ok(updated));
    }

    #[test]
    fn delete_in_scope_removes_record() {
        let fixture = get_fixture();
        let scope = personal(fixture.user);
        let record: Transaction =
            create(transaction_fields(10.0), &scope, &fixture.connection).unwrap();

        delete::<Transaction>(record.id, &scope, &fixture.connection).unwrap();

        assert_eq!(
            get::<Transaction>(record.id, &scope, &fixture.connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn references_must_be_in_the_same_scope() {
        let fixture = get_fixture();
        let personal_category: Category = create(
            CategoryFields {
                name: "Food".to_owned(),
                category_type: EntryType::Expense,
            },
            &personal(fixture.user),
            &fixture.connection,
        )
        .unwrap();
        let mut fields = transaction_fields(10.0);
        fields.category_id = Some(personal_category.id);

        let result = create::<Transaction>(
            fields.clone(),
            &in_family(fixture.user, fixture.family),
            &fixture.connection,
        );

        assert_eq!(
            result,
            Err(Error::InvalidReference(
                EntityKind::Category,
                personal_category.id
            ))
        );
        assert!(
            create::<Transaction>(fields, &personal(fixture.user), &fixture.connection).is_ok()
        );
    }

    #[test]
    fn invalid_fields_are_rejected_before_writing() {
        let fixture = get_fixture();
        let scope = personal(fixture.user);

        let result = create::<Transaction>(transaction_fields(0.0), &scope, &fixture.connection);

        assert!(matches!(
            result,
            Err(Error::InvalidEntity(EntityKind::Transaction, _))
        ));
        assert_eq!(list::<Transaction>(&scope, &fixture.connection), Ok(vec![]));
    }
}
