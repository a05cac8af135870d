use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::invalidate_auth_cookie;

/// Invalidate the auth cookie and respond with no content.
pub async fn post_log_out(jar: PrivateCookieJar) -> Response {
    (StatusCode::NO_CONTENT, invalidate_auth_cookie(jar)).into_response()
}
