//! The auth guard for protected routes.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::{Duration, UtcOffset};

use crate::{
    AppState, Error,
    auth::{
        UserID,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
        get_user_by_id,
    },
    db,
    timezone::get_local_offset,
};

/// The state needed by [auth_guard].
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How far each authenticated request pushes the cookie expiry.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// Used to check that the cookie's user still exists.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Only let through requests with a valid auth cookie for a registered user.
///
/// The user's ID is inserted into the request extensions, so handlers can take
/// `Extension(user_id): Extension<UserID>`. Requests without a valid cookie,
/// or whose user has since been deleted, get a 401 response.
///
/// The cookie expiry slides forward by the configured duration on each
/// authenticated request.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezone(state.local_timezone).into_response();
    };

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Could not read the cookie jar: {error:?}");
            return Error::Unauthorized.into_response();
        }
    };

    let user_id = match authenticate(&jar, &state) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    let response = next.run(Request::from_parts(parts, body)).await;

    let (mut parts, body) = response.into_parts();
    append_set_cookie_headers(
        &mut parts.headers,
        slide_expiry(jar, state.cookie_duration, local_offset),
    );

    Response::from_parts(parts, body)
}

fn authenticate(jar: &PrivateCookieJar, state: &AuthState) -> Result<UserID, Error> {
    let token = get_token_from_cookies(jar)?;
    let connection = db::lock(&state.db_connection)?;

    match get_user_by_id(token.user_id, &connection) {
        Ok(user) => Ok(user.id),
        Err(Error::NotFound) => {
            tracing::warn!("Rejected auth cookie for unknown user {}", token.user_id);
            Err(Error::Unauthorized)
        }
        Err(error) => Err(error),
    }
}

fn slide_expiry(
    jar: PrivateCookieJar,
    cookie_duration: Duration,
    local_offset: UtcOffset,
) -> PrivateCookieJar {
    match extend_auth_cookie_duration_if_needed(jar.clone(), cookie_duration, local_offset) {
        Ok(updated_jar) => updated_jar,
        Err(error) => {
            tracing::error!("Could not extend the auth cookie: {error}. Keeping the old cookie.");
            jar
        }
    }
}

fn append_set_cookie_headers(headers: &mut HeaderMap, jar: PrivateCookieJar) {
    let jar_response = jar.into_response();

    for value in jar_response.headers().get_all(SET_COOKIE) {
        headers.append(SET_COOKIE, value.to_owned());
    }
}
