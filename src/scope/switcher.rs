//! The htmx scope switcher fragment.
//!
//! The fragment lists Personal and each of the user's families. The active
//! entry is rendered disabled with `aria-current` and without an `hx-post`,
//! so it cannot be selected again from the page. The server still accepts a
//! redundant switch.

use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRefresh;
use maud::{Markup, html};

use crate::{
    Error,
    auth::UserID,
    db::in_transaction,
    endpoints::{self, format_endpoint},
    family::FamilyId,
    scope::{
        EffectiveScope, PERSONAL_SCOPE_NAME, ScopeState, SwitchTargets, list_switch_targets,
        resolve, switch_to_family, switch_to_personal,
    },
};

const ENTRY_STYLE: &str = "block w-full px-4 py-2 text-left text-sm text-gray-700 \
    hover:enabled:bg-gray-100 dark:text-gray-200 dark:hover:enabled:bg-gray-600";
const ACTIVE_ENTRY_STYLE: &str = "block w-full px-4 py-2 text-left text-sm font-semibold \
    text-blue-700 bg-blue-50 dark:text-blue-400 dark:bg-gray-700 cursor-default";

fn switcher_entry(label: &str, switch_endpoint: &str, is_active: bool) -> Markup {
    html! {
        li
        {
            @if is_active {
                button
                    type="button"
                    disabled
                    aria-current="true"
                    class=(ACTIVE_ENTRY_STYLE)
                {
                    (label)
                }
            } @else {
                button
                    type="button"
                    hx-post=(switch_endpoint)
                    hx-target="#scope-switcher"
                    hx-swap="outerHTML"
                    class=(ENTRY_STYLE)
                {
                    (label)
                }
            }
        }
    }
}

fn active_label(active: EffectiveScope, targets: &SwitchTargets) -> String {
    match active {
        EffectiveScope::Personal => PERSONAL_SCOPE_NAME.to_owned(),
        EffectiveScope::Family(family_id) => targets
            .families
            .iter()
            .find(|family| family.id == family_id)
            .map(|family| family.name.to_string())
            .unwrap_or_else(|| PERSONAL_SCOPE_NAME.to_owned()),
    }
}

/// Render the switcher for a user in `active` scope.
pub fn scope_switcher(active: EffectiveScope, targets: &SwitchTargets) -> Markup {
    html! {
        nav
            id="scope-switcher"
            aria-label="Switch scope"
            class="w-56 bg-white rounded-lg shadow-sm dark:bg-gray-800"
        {
            p class="px-4 pt-3 text-xs font-medium uppercase text-gray-500 dark:text-gray-400"
            {
                "Viewing: " (active_label(active, targets))
            }

            ul class="py-2"
            {
                (switcher_entry(
                    PERSONAL_SCOPE_NAME,
                    endpoints::SWITCHER_PERSONAL,
                    active == EffectiveScope::Personal,
                ))

                @for family in &targets.families {
                    (switcher_entry(
                        family.name.as_ref(),
                        &format_endpoint(endpoints::SWITCHER_FAMILY, family.id.as_i64()),
                        active == EffectiveScope::Family(family.id),
                    ))
                }
            }
        }
    }
}

fn render_switcher(user_id: UserID, state: &ScopeState) -> Result<Markup, Error> {
    in_transaction(&state.db_connection, |transaction| {
        let active = resolve(user_id, transaction)?;
        let targets = list_switch_targets(user_id, transaction)?;

        Ok(scope_switcher(active, &targets))
    })
}

/// Get the switcher fragment.
pub async fn get_scope_switcher(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    match render_switcher(user_id, &state) {
        Ok(markup) => markup.into_response(),
        Err(error) => error.into_alert_response(),
    }
}

fn switch_and_render(
    user_id: UserID,
    target: EffectiveScope,
    state: &ScopeState,
) -> Result<Markup, Error> {
    in_transaction(&state.db_connection, |transaction| {
        let active = match target {
            EffectiveScope::Personal => switch_to_personal(user_id, transaction)?,
            EffectiveScope::Family(family_id) => {
                switch_to_family(user_id, family_id, transaction)?
            }
        };
        let targets = list_switch_targets(user_id, transaction)?;

        Ok(scope_switcher(active, &targets))
    })
}

/// Switch to Personal from the switcher.
///
/// Every scoped view on the page depends on the scope, so the response asks
/// htmx to refresh the page.
pub async fn post_switcher_personal(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    match switch_and_render(user_id, EffectiveScope::Personal, &state) {
        Ok(markup) => (HxRefresh(true), markup).into_response(),
        Err(error) => error.into_alert_response(),
    }
}

/// Switch to a family from the switcher.
pub async fn post_switcher_family(
    State(state): State<ScopeState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
) -> Response {
    match switch_and_render(user_id, EffectiveScope::Family(family_id), &state) {
        Ok(markup) => (HxRefresh(true), markup).into_response(),
        Err(error) => error.into_alert_response(),
    }
}
