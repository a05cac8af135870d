//! Viewing, renaming and deleting a family, and importing into it.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth::UserID,
    db::in_transaction,
    family::{
        Family, FamilyId, FamilyName, Member, Role, delete_family, get_family, list_members,
        rename_family, require_admin, require_member,
    },
    gateway::{ImportSelection, import_personal_data},
};

/// The state needed by the family handlers.
#[derive(Debug, Clone)]
pub struct FamilyState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for FamilyState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A family with its members, as seen by one of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyDetail {
    #[serde(flatten)]
    pub family: Family,
    pub members: Vec<Member>,
    /// The role of the user who asked.
    pub role: Role,
}

/// The body of a rename request.
#[derive(Debug, Deserialize)]
pub struct RenameFamilyForm {
    pub name: String,
}

/// Get a family and its members.
pub async fn get_family_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let family = get_family(family_id, transaction)?;
        let role = require_member(family_id, user_id, transaction)?;
        let members = list_members(family_id, transaction)?;

        Ok(FamilyDetail {
            family,
            members,
            role,
        })
    })
    .map(Json)
    .into_response()
}

/// Rename a family.
pub async fn rename_family_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
    Json(form): Json<RenameFamilyForm>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        let name = FamilyName::new(&form.name)?;
        rename_family(family_id, &name, transaction)?;
        tracing::info!("User {user_id} renamed family {family_id} to {name}");

        get_family(family_id, transaction)
    })
    .map(Json)
    .into_response()
}

/// Delete a family.
///
/// The family's records go back to their owners' Personal scope.
pub async fn delete_family_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        delete_family(family_id, transaction)?;
        tracing::info!("User {user_id} deleted family {family_id}");

        Ok(())
    })
    .map(|()| StatusCode::NO_CONTENT)
    .into_response()
}

/// Copy more of the caller's Personal records into a family they belong to.
pub async fn import_into_family_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
    Json(selection): Json<ImportSelection>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_member(family_id, user_id, transaction)?;

        import_personal_data(user_id, family_id, &selection, transaction)
    })
    .map(Json)
    .into_response()
}

#[cfg(test)]
mod manage_family_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::macros::date;

    use crate::{
        auth::{PasswordHash, UserID, create_user},
        category::{Category, CategoryFields},
        db::initialize,
        endpoints::{self, format_endpoint},
        family::{FamilyId, FamilyName, Role, add_member, get_family, insert_family},
        gateway::query,
        scope::{EffectiveScope, RequestScope, get_active_family_id, switch_to_family},
        transaction::{EntryType, PaymentMethod, Transaction, TransactionFields},
    };

    use super::{
        FamilyState, delete_family_endpoint, get_family_endpoint, import_into_family_endpoint,
        rename_family_endpoint,
    };

    struct Fixture {
        db_connection: Arc<Mutex<Connection>>,
        admin: UserID,
        member: UserID,
        stranger: UserID,
        family_id: FamilyId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let admin = create_user("a@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let member = create_user("b@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let stranger = create_user("c@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let family_id = insert_family(FamilyName::new_unchecked("Smiths"), admin, &connection)
            .unwrap()
            .id;
        add_member(family_id, admin, Role::Admin, &connection).unwrap();
        add_member(family_id, member, Role::Member, &connection).unwrap();

        Fixture {
            db_connection: Arc::new(Mutex::new(connection)),
            admin,
            member,
            stranger,
            family_id,
        }
    }

    fn server_as(fixture: &Fixture, user_id: UserID) -> TestServer {
        let state = FamilyState {
            db_connection: fixture.db_connection.clone(),
        };
        let app = Router::new()
            .route(
                endpoints::FAMILY,
                get(get_family_endpoint)
                    .put(rename_family_endpoint)
                    .delete(delete_family_endpoint),
            )
            .route(
                endpoints::FAMILY_IMPORT,
                axum::routing::post(import_into_family_endpoint),
            )
            .layer(Extension(user_id))
            .with_state(state);

        TestServer::try_new(app).unwrap()
    }

    fn family_path(fixture: &Fixture) -> String {
        format_endpoint(endpoints::FAMILY, fixture.family_id.as_i64())
    }

    #[tokio::test]
    async fn member_sees_detail_with_members() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.member);

        let response = server.get(&family_path(&fixture)).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["name"], "Smiths");
        assert_eq!(body["role"], "member");
        assert_eq!(body["members"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn stranger_is_forbidden() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.stranger);

        let response = server.get(&family_path(&fixture)).await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"], "not_member");
    }

    #[tokio::test]
    async fn missing_family_is_not_found() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let response = server
            .get(&format_endpoint(endpoints::FAMILY, 999))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_can_rename_but_not_to_personal() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let renamed = server
            .put(&family_path(&fixture))
            .json(&json!({"name": "The Smiths"}))
            .await;
        let reserved = server
            .put(&family_path(&fixture))
            .json(&json!({"name": " personal "}))
            .await;

        renamed.assert_status_ok();
        assert_eq!(renamed.json::<Value>()["name"], "The Smiths");
        reserved.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reserved.json::<Value>()["error"], "reserved_family_name");
        let connection = fixture.db_connection.lock().unwrap();
        assert_eq!(
            get_family(fixture.family_id, &connection).unwrap().name,
            FamilyName::new_unchecked("The Smiths")
        );
    }

    #[tokio::test]
    async fn member_cannot_rename_or_delete() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.member);

        let rename = server
            .put(&family_path(&fixture))
            .json(&json!({"name": "Ours now"}))
            .await;
        let delete = server.delete(&family_path(&fixture)).await;

        rename.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(rename.json::<Value>()["error"], "not_admin");
        delete.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delete_resets_active_scopes() {
        let fixture = get_fixture();
        {
            let connection = fixture.db_connection.lock().unwrap();
            let transaction = connection.unchecked_transaction().unwrap();
            switch_to_family(fixture.member, fixture.family_id, &transaction).unwrap();
            transaction.commit().unwrap();
        }
        let server = server_as(&fixture, fixture.admin);

        server
            .delete(&family_path(&fixture))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let connection = fixture.db_connection.lock().unwrap();
        assert_eq!(get_active_family_id(fixture.member, &connection), Ok(None));
    }

    #[tokio::test]
    async fn delete_returns_each_record_to_its_owner() {
        let fixture = get_fixture();
        let in_family = |user_id| RequestScope {
            user_id,
            scope: EffectiveScope::Family(fixture.family_id),
        };
        let personal = |user_id| RequestScope {
            user_id,
            scope: EffectiveScope::Personal,
        };
        let (shared_category, transaction) = {
            let connection = fixture.db_connection.lock().unwrap();
            let shared_category: Category = query::create(
                CategoryFields {
                    name: "Groceries".to_owned(),
                    category_type: EntryType::Expense,
                },
                &in_family(fixture.admin),
                &connection,
            )
            .unwrap();
            let transaction: Transaction = query::create(
                TransactionFields {
                    amount: 35.0,
                    transaction_type: EntryType::Expense,
                    payment_method: PaymentMethod::Upi,
                    date: date!(2025 - 07 - 04),
                    payee: Some("Market".to_owned()),
                    notes: None,
                    category_id: Some(shared_category.id),
                    credit_source_id: None,
                },
                &in_family(fixture.member),
                &connection,
            )
            .unwrap();
            (shared_category, transaction)
        };
        let server = server_as(&fixture, fixture.admin);

        server
            .delete(&family_path(&fixture))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let connection = fixture.db_connection.lock().unwrap();
        let admin_categories: Vec<Category> =
            query::list(&personal(fixture.admin), &connection).unwrap();
        let member_transactions: Vec<Transaction> =
            query::list(&personal(fixture.member), &connection).unwrap();
        let member_categories: Vec<Category> =
            query::list(&personal(fixture.member), &connection).unwrap();
        assert_eq!(
            admin_categories.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![shared_category.id]
        );
        assert_eq!(admin_categories[0].family_id, None);
        assert!(member_categories.is_empty());
        assert_eq!(member_transactions.len(), 1);
        assert_eq!(member_transactions[0].id, transaction.id);
        assert_eq!(member_transactions[0].family_id, None);
        assert_eq!(member_transactions[0].fields.category_id, None);
        assert_eq!(
            member_transactions[0].fields.payee.as_deref(),
            Some("Market")
        );
    }

    #[tokio::test]
    async fn import_requires_membership() {
        let fixture = get_fixture();
        let member_server = server_as(&fixture, fixture.member);
        let stranger_server = server_as(&fixture, fixture.stranger);
        let path = format_endpoint(endpoints::FAMILY_IMPORT, fixture.family_id.as_i64());

        let allowed = member_server
            .post(&path)
            .json(&json!({"categories": true}))
            .await;
        let denied = stranger_server
            .post(&path)
            .json(&json!({"categories": true}))
            .await;

        allowed.assert_status_ok();
        assert_eq!(allowed.json::<Value>()["copied"]["category"], 0);
        denied.assert_status(StatusCode::FORBIDDEN);
    }
}
