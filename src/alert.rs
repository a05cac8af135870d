//! Alert fragments for htmx responses.
//!
//! Alerts are swapped out-of-band into the page's `#alert-container`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

/// Render an error alert as an out-of-band swap into the alert container.
pub fn error_alert(message: &str, details: &str) -> Markup {
    html! {
        div id="alert-container" hx-swap-oob="true" class="w-full max-w-md px-4"
        {
            div
                role="alert"
                class="p-4 mb-4 text-red-800 border border-red-300 rounded-lg bg-red-50
                    dark:bg-gray-800 dark:text-red-400 dark:border-red-800"
            {
                h3 class="text-lg font-medium" { (message) }

                @if !details.is_empty() {
                    p class="mt-2 text-sm" { (details) }
                }
            }
        }
    }
}

/// Render an error alert with `status_code`.
pub fn render_error(status_code: StatusCode, message: &str, details: &str) -> Response {
    (status_code, error_alert(message, details)).into_response()
}
