//! Ledger is a web app for tracking personal and family expenses.
//!
//! Every user works in exactly one scope at a time: their Personal scope, or
//! one of the families they belong to. The [scope] module owns the active
//! scope of each user and the [gateway] module filters every transaction,
//! budget, credit source and category by it.
//!
//! This library provides a JSON API plus a small htmx fragment for switching
//! scope.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod budget;
mod category;
mod credit_source;
mod db;
mod endpoints;
mod family;
mod gateway;
mod logging;
mod routing;
mod scope;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{
    PasswordHash, User, UserID, ValidatedPassword, create_user, get_user_by_email, update_password,
};
pub use db::{DatabaseId, initialize as initialize_db};
pub use family::{FamilyId, FamilyName, Role, add_member, insert_family};
pub use gateway::EntityKind;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use scope::{EffectiveScope, PERSONAL_SCOPE_NAME};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for the ctrl+c signal: {error}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not install the terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user tried to switch to, or act within, a family they do not belong to.
    #[error("you are not a member of this family")]
    NotMember,

    /// The user tried to manage a family without the admin role.
    #[error("only family admins can do this")]
    NotAdmin,

    /// The change would leave a family with members but no admin.
    ///
    /// The caller should promote another member first, or delete the family
    /// if they are its only member.
    #[error("a family must keep at least one admin")]
    LastAdmin,

    /// The family ID does not refer to an existing family.
    #[error("the family could not be found")]
    FamilyNotFound,

    /// The family name is the name reserved for the Personal scope.
    #[error("\"{PERSONAL_SCOPE_NAME}\" is reserved and cannot be used as a family name")]
    ReservedFamilyName,

    /// An empty string was used as a family name.
    #[error("family name cannot be empty")]
    EmptyFamilyName,

    /// The family name is longer than the maximum length.
    #[error("family name is too long")]
    FamilyNameTooLong,

    /// The string is not one of the membership roles.
    #[error("\"{0}\" is not a valid role")]
    InvalidRole(String),

    /// The record exists but belongs to a different scope than the caller's
    /// active scope, so it may not be changed from here.
    #[error("the record belongs to a different scope, switch scope to change it")]
    ScopeMismatch,

    /// A record failed validation before it was written.
    #[error("invalid {0}: {1}")]
    InvalidEntity(EntityKind, String),

    /// A record referenced another record that is not visible in the caller's scope.
    #[error("{0} {1} does not exist in the active scope")]
    InvalidReference(EntityKind, DatabaseId),

    /// A pending invite already exists for the email address.
    #[error("an invite has already been sent to this email")]
    DuplicateInvite,

    /// The user is already a member of the family.
    #[error("the user is already a member of this family")]
    AlreadyMember,

    /// The invite has already been used.
    #[error("the invite has already been accepted")]
    InviteAccepted,

    /// The invite is past its expiry date.
    #[error("the invite has expired")]
    InviteExpired,

    /// The invite was addressed to a different email than the current user's.
    #[error("the invite was sent to a different email address")]
    InviteEmailMismatch,

    /// The string is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address is already registered.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid auth cookie.
    #[error("you need to log in first")]
    Unauthorized,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The password and the confirmation password were different.
    #[error("passwords do not match")]
    PasswordsDoNotMatch,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The auth cookie could not be created or read.
    #[error("could not handle the auth cookie: {0}")]
    CookieError(String),

    /// The server was configured with an unknown timezone.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("family_member.") =>
            {
                Error::AlreadyMember
            }
            // Code 275 occurs when a CHECK constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 275 && desc.contains("family_name_not_reserved") =>
            {
                Error::ReservedFamilyName
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON body sent to API clients when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl Error {
    /// A stable, machine readable name for the error.
    fn code(&self) -> &'static str {
        match self {
            Error::NotMember => "not_member",
            Error::NotAdmin => "not_admin",
            Error::LastAdmin => "last_admin",
            Error::FamilyNotFound => "family_not_found",
            Error::ReservedFamilyName => "reserved_family_name",
            Error::EmptyFamilyName => "empty_family_name",
            Error::FamilyNameTooLong => "family_name_too_long",
            Error::InvalidRole(_) => "invalid_role",
            Error::ScopeMismatch => "scope_mismatch",
            Error::InvalidEntity(..) => "invalid_entity",
            Error::InvalidReference(..) => "invalid_reference",
            Error::DuplicateInvite => "duplicate_invite",
            Error::AlreadyMember => "already_member",
            Error::InviteAccepted => "invite_accepted",
            Error::InviteExpired => "invite_expired",
            Error::InviteEmailMismatch => "invite_email_mismatch",
            Error::InvalidEmail(_) => "invalid_email",
            Error::DuplicateEmail => "duplicate_email",
            Error::InvalidCredentials => "invalid_credentials",
            Error::Unauthorized => "unauthorized",
            Error::TooWeak(_) => "password_too_weak",
            Error::PasswordsDoNotMatch => "passwords_do_not_match",
            Error::NotFound => "not_found",
            Error::HashingError(_)
            | Error::CookieError(_)
            | Error::InvalidTimezone(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => "internal_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotMember | Error::NotAdmin | Error::InviteEmailMismatch => {
                StatusCode::FORBIDDEN
            }
            Error::FamilyNotFound | Error::NotFound => StatusCode::NOT_FOUND,
            Error::LastAdmin
            | Error::ScopeMismatch
            | Error::DuplicateInvite
            | Error::AlreadyMember
            | Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::InviteAccepted | Error::InviteExpired => StatusCode::GONE,
            Error::ReservedFamilyName
            | Error::EmptyFamilyName
            | Error::FamilyNameTooLong
            | Error::InvalidRole(_)
            | Error::InvalidEntity(..)
            | Error::InvalidReference(..)
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::PasswordsDoNotMatch => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::HashingError(_)
            | Error::CookieError(_)
            | Error::InvalidTimezone(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to show the client.
    ///
    /// Internal errors are logged and replaced with a generic message.
    fn client_message(&self) -> String {
        if self.status_code().is_server_error() {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        }
    }

    /// Render the error as an HTML alert fragment for htmx requests.
    pub(crate) fn into_alert_response(self) -> Response {
        let status_code = self.status_code();
        let title = if status_code.is_server_error() {
            "Something went wrong"
        } else {
            "Could not switch scope"
        };

        alert::render_error(status_code, title, &self.client_message())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.client_message(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
