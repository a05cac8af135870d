//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    auth::{auth_guard, post_log_in, post_log_out, register_user},
    budget::{Budget, get_active_budgets_endpoint},
    category::Category,
    credit_source::CreditSource,
    endpoints,
    family::{
        accept_invite_endpoint, create_family_endpoint, create_invite_endpoint,
        delete_family_endpoint, delete_invite_endpoint, get_family_endpoint,
        get_received_invites_endpoint, import_into_family_endpoint, list_invites_endpoint,
        remove_member_endpoint, rename_family_endpoint, set_member_role_endpoint,
    },
    gateway::{
        ScopedEntity, create_entity_endpoint, delete_entity_endpoint, get_entity_endpoint,
        list_entities_endpoint, update_entity_endpoint,
    },
    scope::{
        get_families_endpoint, get_scope_endpoint, get_scope_switcher,
        get_switch_targets_endpoint, post_switcher_family, post_switcher_personal,
        switch_to_family_endpoint, switch_to_personal_endpoint,
    },
    transaction::{Transaction, get_transaction_summary_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(endpoints::SCOPE, get(get_scope_endpoint))
        .route(endpoints::SCOPE_TARGETS, get(get_switch_targets_endpoint))
        .route(endpoints::SCOPE_FAMILY, post(switch_to_family_endpoint))
        .route(endpoints::SCOPE_PERSONAL, post(switch_to_personal_endpoint))
        .route(endpoints::SWITCHER, get(get_scope_switcher))
        .route(endpoints::SWITCHER_PERSONAL, post(post_switcher_personal))
        .route(endpoints::SWITCHER_FAMILY, post(post_switcher_family))
        .route(
            endpoints::FAMILIES,
            get(get_families_endpoint).post(create_family_endpoint),
        )
        .route(
            endpoints::FAMILY,
            get(get_family_endpoint)
                .put(rename_family_endpoint)
                .delete(delete_family_endpoint),
        )
        .route(endpoints::FAMILY_IMPORT, post(import_into_family_endpoint))
        .route(
            endpoints::FAMILY_MEMBER,
            put(set_member_role_endpoint).delete(remove_member_endpoint),
        )
        .route(
            endpoints::FAMILY_INVITES,
            get(list_invites_endpoint).post(create_invite_endpoint),
        )
        .route(endpoints::FAMILY_INVITE, delete(delete_invite_endpoint))
        .route(endpoints::INVITES, get(get_received_invites_endpoint))
        .route(endpoints::ACCEPT_INVITE, post(accept_invite_endpoint))
        .route(
            endpoints::TRANSACTIONS_SUMMARY,
            get(get_transaction_summary_endpoint),
        )
        .route(endpoints::BUDGETS_ACTIVE, get(get_active_budgets_endpoint))
        .merge(scoped_routes::<Transaction>(
            endpoints::TRANSACTIONS,
            endpoints::TRANSACTION,
        ))
        .merge(scoped_routes::<Budget>(endpoints::BUDGETS, endpoints::BUDGET))
        .merge(scoped_routes::<CreditSource>(
            endpoints::CREDIT_SOURCES,
            endpoints::CREDIT_SOURCE,
        ))
        .merge(scoped_routes::<Category>(
            endpoints::CATEGORIES,
            endpoints::CATEGORY,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .with_state(state)
}

/// The list, create, get, update and delete routes for records of kind `E`.
fn scoped_routes<E: ScopedEntity>(
    collection_path: &str,
    item_path: &str,
) -> Router<AppState> {
    Router::new()
        .route(
            collection_path,
            get(list_entities_endpoint::<E>).post(create_entity_endpoint::<E>),
        )
        .route(
            item_path,
            get(get_entity_endpoint::<E>)
                .put(update_entity_endpoint::<E>)
                .delete(delete_entity_endpoint::<E>),
        )
}
