//! Generic JSON handlers for the scoped records.
//!
//! Each handler resolves the caller's scope in the same transaction as the
//! read or write it guards, so a concurrent scope switch cannot land between
//! the two.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, DatabaseId,
    auth::UserID,
    db::in_transaction,
    gateway::{ScopedEntity, query},
    scope::resolve_request,
};

/// The state needed by the record handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// Decides which day "today" is for date-based reads.
    pub local_timezone: String,
}

impl FromRef<AppState> for GatewayState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// List the records of kind `E` in the caller's active scope.
pub async fn list_entities_endpoint<E: ScopedEntity>(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        query::list::<E>(&scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Get one record of kind `E` from the caller's active scope.
pub async fn get_entity_endpoint<E: ScopedEntity>(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
    Path(id): Path<DatabaseId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        query::get::<E>(id, &scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Create a record of kind `E` in the caller's active scope.
pub async fn create_entity_endpoint<E: ScopedEntity>(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
    Json(fields): Json<E::Fields>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        query::create::<E>(fields, &scope, transaction)
    })
    .map(|entity| (StatusCode::CREATED, Json(entity)))
    .into_response()
}

/// Replace the fields of a record of kind `E` in the caller's active scope.
pub async fn update_entity_endpoint<E: ScopedEntity>(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
    Path(id): Path<DatabaseId>,
    Json(fields): Json<E::Fields>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        query::update::<E>(id, fields, &scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Delete a record of kind `E` from the caller's active scope.
pub async fn delete_entity_endpoint<E: ScopedEntity>(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
    Path(id): Path<DatabaseId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        query::delete::<E>(id, &scope, transaction)
    })
    .map(|()| StatusCode::NO_CONTENT)
    .into_response()
}

#[cfg(test)]
mod gateway_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        auth::{PasswordHash, create_user},
        category::Category,
        db::initialize,
        endpoints::{self, format_endpoint},
        family::{FamilyId, FamilyName, Role, add_member, insert_family},
        gateway::GatewayState,
        scope::switch_to_family,
    };

    use super::{
        create_entity_endpoint, delete_entity_endpoint, get_entity_endpoint,
        list_entities_endpoint, update_entity_endpoint,
    };

    struct Fixture {
        server: TestServer,
        db_connection: Arc<Mutex<Connection>>,
        user: crate::auth::UserID,
        family_id: FamilyId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user =
            create_user("a@example.com", PasswordHash::new_unchecked("x"), &connection).unwrap();
        let family =
            insert_family(FamilyName::new_unchecked("Smiths"), user.id, &connection).unwrap();
        add_member(family.id, user.id, Role::Admin, &connection).unwrap();

        let db_connection = Arc::new(Mutex::new(connection));
        let state = GatewayState {
            db_connection: db_connection.clone(),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let app = Router::new()
            .route(
                endpoints::CATEGORIES,
                get(list_entities_endpoint::<Category>).post(create_entity_endpoint::<Category>),
            )
            .route(
                endpoints::CATEGORY,
                get(get_entity_endpoint::<Category>)
                    .put(update_entity_endpoint::<Category>)
                    .delete(delete_entity_endpoint::<Category>),
            )
            .layer(Extension(user.id))
            .with_state(state);

        Fixture {
            server: TestServer::try_new(app).unwrap(),
            db_connection,
            user: user.id,
            family_id: family.id,
        }
    }

    fn switch_into_family(fixture: &Fixture) {
        let connection = fixture.db_connection.lock().unwrap();
        let transaction = connection.unchecked_transaction().unwrap();
        switch_to_family(fixture.user, fixture.family_id, &transaction).unwrap();
        transaction.commit().unwrap();
    }

    #[tokio::test]
    async fn create_then_list_in_scope() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Rent", "category_type": "expense"}))
            .await;

        response.assert_status(StatusCode::CREATED);
        let created = response.json::<Value>();
        assert_eq!(created["family_id"], Value::Null);
        let listed = fixture.server.get(endpoints::CATEGORIES).await.json::<Value>();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        switch_into_family(&fixture);
        let listed = fixture.server.get(endpoints::CATEGORIES).await.json::<Value>();
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn client_cannot_choose_family() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post(endpoints::CATEGORIES)
            .json(&json!({
                "name": "Rent",
                "category_type": "expense",
                "family_id": fixture.family_id.as_i64()
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["family_id"], Value::Null);
    }

    #[tokio::test]
    async fn writes_from_wrong_scope_are_conflicts() {
        let fixture = get_fixture();
        let created = fixture
            .server
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Rent", "category_type": "expense"}))
            .await
            .json::<Value>();
        let id = created["id"].as_i64().unwrap();
        switch_into_family(&fixture);
        let path = format_endpoint(endpoints::CATEGORY, id);

        let update = fixture
            .server
            .put(&path)
            .json(&json!({"name": "Mortgage", "category_type": "expense"}))
            .await;
        let delete = fixture.server.delete(&path).await;
        let get = fixture.server.get(&path).await;

        update.assert_status(StatusCode::CONFLICT);
        assert_eq!(update.json::<Value>()["error"], "scope_mismatch");
        delete.assert_status(StatusCode::CONFLICT);
        get.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_in_scope() {
        let fixture = get_fixture();
        let created = fixture
            .server
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Rent", "category_type": "expense"}))
            .await
            .json::<Value>();
        let path = format_endpoint(endpoints::CATEGORY, created["id"].as_i64().unwrap());

        let updated = fixture
            .server
            .put(&path)
            .json(&json!({"name": "Salary", "category_type": "income"}))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["category_type"], "income");

        fixture
            .server
            .delete(&path)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        fixture
            .server
            .get(&path)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_fields_are_unprocessable() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "  ", "category_type": "expense"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "invalid_entity");
    }
}
