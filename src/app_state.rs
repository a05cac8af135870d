//! The shared state of the server and the secrets derived from its configuration.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error, PasswordHash, auth::DEFAULT_COOKIE_DURATION, db::initialize,
    timezone::get_local_offset,
};

/// The state shared by every route.
///
/// Handlers take the narrower sub-states (e.g. `ScopeState`, `FamilyState`)
/// which are built from this one with [FromRef].
#[derive(Debug, Clone)]
pub struct AppState {
    /// Signs and encrypts the private auth cookie.
    pub cookie_key: Key,

    /// How long an auth cookie stays valid after the last request.
    pub cookie_duration: Duration,

    /// The server's timezone as a canonical name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,

    /// The one connection to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create the state, creating any missing tables in `db_connection`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidTimezone] if `local_timezone` is not a canonical
    /// timezone name, or an SQL error if the tables could not be created.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezone(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            password_hash_cost: PasswordHash::DEFAULT_COST,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Derive the cookie key from the server `secret`.
///
/// The same secret always gives the same key, so cookies survive a restart.
pub fn create_cookie_key(secret: &str) -> Key {
    Key::from(&Sha512::digest(secret))
}
