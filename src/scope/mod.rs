//! The active scope of each user and the rules for changing it.
//!
//! A user is always in exactly one scope, Personal or one of their families.
//! The scope is stored as `user.active_family_id` and resolved afresh on every
//! request.

mod domain;
mod endpoints;
mod resolver;
mod store;
mod switch;
mod switcher;

pub use domain::{EffectiveScope, PERSONAL_SCOPE_NAME, RequestScope, ScopeView, SwitchTargets};
pub use endpoints::{
    ScopeState, get_families_endpoint, get_scope_endpoint, get_switch_targets_endpoint,
    switch_to_family_endpoint, switch_to_personal_endpoint,
};
pub use resolver::{describe_scope, list_switch_targets, resolve, resolve_request};
pub use store::get_active_family_id;
pub(crate) use store::clear_active_family_if;
pub use switch::{switch_to_family, switch_to_personal};
pub use switcher::{get_scope_switcher, post_switcher_family, post_switcher_personal};
