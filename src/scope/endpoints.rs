//! The JSON routes for reading and changing the active scope.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState,
    auth::UserID,
    db::in_transaction,
    family::{FamilyId, list_families_for_user},
    scope::{describe_scope, list_switch_targets, resolve, switch_to_family, switch_to_personal},
};

/// The state needed by the scope routes.
#[derive(Debug, Clone)]
pub struct ScopeState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ScopeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the families the user belongs to. Personal is never in the list.
pub async fn get_families_endpoint(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        list_families_for_user(user_id, transaction)
    })
    .map(Json)
    .into_response()
}

/// Get the user's effective scope. Personal is a normal response, not an error.
pub async fn get_scope_endpoint(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve(user_id, transaction)?;
        describe_scope(scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// List the scopes the user may switch to.
pub async fn get_switch_targets_endpoint(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        list_switch_targets(user_id, transaction)
    })
    .map(Json)
    .into_response()
}

/// Switch the user into one of their families.
pub async fn switch_to_family_endpoint(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = switch_to_family(user_id, family_id, transaction)?;
        describe_scope(scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Switch the user back to their Personal scope.
pub async fn switch_to_personal_endpoint(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = switch_to_personal(user_id, transaction)?;
        describe_scope(scope, transaction)
    })
    .map(Json)
    .into_response()
}
