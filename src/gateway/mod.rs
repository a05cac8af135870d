//! Scope-filtered access to transactions, budgets, credit sources and categories.
//!
//! Reads return only the records of the caller's active scope. Writes stamp
//! the owner and family from the scope, and records from another scope can be
//! neither read nor changed.

mod endpoints;
mod entity;
mod import;
pub mod query;

pub use endpoints::{
    GatewayState, create_entity_endpoint, delete_entity_endpoint, get_entity_endpoint,
    list_entities_endpoint, update_entity_endpoint,
};
pub use entity::{CopyMap, EntityKind, ScopedEntity, remap};
pub use import::{ImportReport, ImportSelection, import_personal_data};
