//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/families/{family_id}', use [format_endpoint].

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";

/// The route for the caller's active scope.
pub const SCOPE: &str = "/api/scope";
/// The route listing where the caller may switch to.
pub const SCOPE_TARGETS: &str = "/api/scope/targets";
/// The route to switch the caller into a family.
pub const SCOPE_FAMILY: &str = "/api/scope/family/{family_id}";
/// The route to switch the caller to Personal.
pub const SCOPE_PERSONAL: &str = "/api/scope/personal";

/// The route to list and create the caller's families.
pub const FAMILIES: &str = "/api/families";
/// The route to view, rename and delete a family.
pub const FAMILY: &str = "/api/families/{family_id}";
/// The route to copy Personal records into a family.
pub const FAMILY_IMPORT: &str = "/api/families/{family_id}/import";
/// The route to change the role of, or remove, a family member.
pub const FAMILY_MEMBER: &str = "/api/families/{family_id}/members/{user_id}";
/// The route to list and send a family's invites.
pub const FAMILY_INVITES: &str = "/api/families/{family_id}/invites";
/// The route to withdraw an invite.
pub const FAMILY_INVITE: &str = "/api/families/{family_id}/invites/{invite_id}";
/// The route listing the invites addressed to the caller.
pub const INVITES: &str = "/api/invites";
/// The route to accept an invite.
pub const ACCEPT_INVITE: &str = "/api/invites/{token}/accept";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{id}";
/// The route for the income and expense totals of the active scope.
pub const TRANSACTIONS_SUMMARY: &str = "/api/transactions/summary";
/// The route to list and create budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/api/budgets/{id}";
/// The route listing the budgets of the active scope that are running today.
pub const BUDGETS_ACTIVE: &str = "/api/budgets/active";
/// The route to list and create credit sources.
pub const CREDIT_SOURCES: &str = "/api/credit_sources";
/// The route to access a single credit source.
pub const CREDIT_SOURCE: &str = "/api/credit_sources/{id}";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/categories/{id}";

/// The htmx fragment for switching scope.
pub const SWITCHER: &str = "/scope/switcher";
/// The switcher action for switching to Personal.
pub const SWITCHER_PERSONAL: &str = "/scope/switcher/personal";
/// The switcher action for switching into a family.
pub const SWITCHER_FAMILY: &str = "/scope/switcher/families/{family_id}";

/// Replace the first parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters.
/// Call it once per parameter for paths with more than one.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
