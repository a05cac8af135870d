//! The route for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{PasswordHash, ValidatedPassword, create_user, normalize_email},
    db,
};

/// The state needed for registering a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The bcrypt cost used for the new password hash.
    pub password_hash_cost: u32,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            password_hash_cost: state.password_hash_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data needed to register a new account.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Create a user account and respond with the user as JSON.
///
/// The password is hashed before the database lock is taken.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(form): Json<RegisterForm>,
) -> Response {
    match register_user_internal(&state, &form) {
        Ok(user) => {
            tracing::info!("Registered user {}", user.id);
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

fn register_user_internal(
    state: &RegistrationState,
    form: &RegisterForm,
) -> Result<crate::auth::User, Error> {
    let email = normalize_email(&form.email)?;
    let password = ValidatedPassword::new_confirmed(&form.password, &form.confirm_password)?;
    let password_hash = PasswordHash::new(password, state.password_hash_cost)?;

    let connection = db::lock(&state.db_connection)?;

    create_user(&email, password_hash, &connection)
}
