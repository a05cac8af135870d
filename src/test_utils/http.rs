use axum::http::StatusCode;
use cookie::CookieJar;
use axum_test::TestServer;
use serde_json::json;

use crate::endpoints;

pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// Register `email` through the API, log in and return the auth cookies.
pub(crate) async fn register_and_log_in(server: &TestServer, email: &str) -> CookieJar {
    server
        .post(endpoints::USERS)
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "confirm_password": TEST_PASSWORD,
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post(endpoints::LOG_IN_API)
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();

    response.cookies()
}
