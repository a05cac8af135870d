//! Creating a family.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::UserID,
    db::in_transaction,
    family::{Family, FamilyName, FamilyState, Role, add_member, insert_family},
    gateway::{ImportReport, ImportSelection, import_personal_data},
    scope::{ScopeView, describe_scope, switch_to_family},
};

/// The body of a request to create a family.
#[derive(Debug, Deserialize)]
pub struct CreateFamilyForm {
    pub name: String,
    /// The Personal records to copy into the new family, if any.
    #[serde(default)]
    pub import: Option<ImportSelection>,
}

/// The result of creating a family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedFamily {
    pub family: Family,
    /// The creator's scope, which is now the new family.
    pub scope: ScopeView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_report: Option<ImportReport>,
}

/// Create a family with `user_id` as its first admin.
///
/// The selected Personal records are copied in and the creator is switched
/// into the family, all in `transaction`.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred. An import
/// that fails for some kinds of record does not fail the creation, see
/// [CreatedFamily::import_report].
pub fn create_family(
    name: FamilyName,
    user_id: UserID,
    import: Option<&ImportSelection>,
    transaction: &mut Transaction<'_>,
) -> Result<CreatedFamily, Error> {
    let family = insert_family(name, user_id, transaction)?;
    add_member(family.id, user_id, Role::Admin, transaction)?;
    tracing::info!("User {user_id} created family {}", family.id);

    let import_report = match import {
        Some(selection) => Some(import_personal_data(
            user_id,
            family.id,
            selection,
            transaction,
        )?),
        None => None,
    };

    let scope = switch_to_family(user_id, family.id, transaction)?;
    let scope = describe_scope(scope, transaction)?;

    Ok(CreatedFamily {
        family,
        scope,
        import_report,
    })
}

/// Create a family and switch into it.
pub async fn create_family_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<CreateFamilyForm>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let name = FamilyName::new(&form.name)?;
        create_family(name, user_id, form.import.as_ref(), transaction)
    })
    .map(|created| (StatusCode::CREATED, Json(created)))
    .into_response()
}
