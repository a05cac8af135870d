//! Changing roles and removing members.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    auth::UserID,
    db::in_transaction,
    family::{
        FamilyId, FamilyState, Role, get_family, list_members, remove_member, require_admin,
        require_member, set_role,
    },
};

/// The body of a role change request.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: Role,
}

/// Change a member's role and return the updated member list.
pub async fn set_member_role_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path((family_id, member_id)): Path<(FamilyId, UserID)>,
    Json(form): Json<RoleForm>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        set_role(family_id, member_id, form.role, transaction)?;
        tracing::info!(
            "User {user_id} made user {member_id} {} of family {family_id}",
            form.role
        );

        list_members(family_id, transaction)
    })
    .map(Json)
    .into_response()
}

/// Remove a member from a family.
///
/// Admins may remove anyone, and any member may remove themself to leave.
pub async fn remove_member_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path((family_id, member_id)): Path<(FamilyId, UserID)>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;

        if member_id == user_id {
            require_member(family_id, user_id, transaction)?;
        } else {
            require_admin(family_id, user_id, transaction)?;
        }

        remove_member(family_id, member_id, transaction)?;
        tracing::info!("User {user_id} removed user {member_id} from family {family_id}");

        Ok(())
    })
    .map(|()| StatusCode::NO_CONTENT)
    .into_response()
}

#[cfg(test)]
mod member_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::put};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        auth::{PasswordHash, UserID, create_user},
        db::initialize,
        endpoints::{self, format_endpoint},
        family::{
            FamilyId, FamilyName, FamilyState, Role, add_member, insert_family,
            membership::get_role,
        },
        scope::{EffectiveScope, resolve, switch_to_family},
    };

    use super::{remove_member_endpoint, set_member_role_endpoint};

    struct Fixture {
        db_connection: Arc<Mutex<Connection>>,
        admin: UserID,
        member: UserID,
        family_id: FamilyId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let admin = create_user("a@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let member = create_user("b@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let family_id = insert_family(FamilyName::new_unchecked("Smiths"), admin, &connection)
            .unwrap()
            .id;
        add_member(family_id, admin, Role::Admin, &connection).unwrap();
        add_member(family_id, member, Role::Member, &connection).unwrap();

        Fixture {
            db_connection: Arc::new(Mutex::new(connection)),
            admin,
            member,
            family_id,
        }
    }

    fn server_as(fixture: &Fixture, user_id: UserID) -> TestServer {
        let state = FamilyState {
            db_connection: fixture.db_connection.clone(),
        };
        let app = Router::new()
            .route(
                endpoints::FAMILY_MEMBER,
                put(set_member_role_endpoint).delete(remove_member_endpoint),
            )
            .layer(Extension(user_id))
            .with_state(state);

        TestServer::try_new(app).unwrap()
    }

    fn member_path(family_id: FamilyId, user_id: UserID) -> String {
        let path = format_endpoint(endpoints::FAMILY_MEMBER, family_id.as_i64());

        format_endpoint(&path, user_id.as_i64())
    }

    #[tokio::test]
    async fn admin_promotes_member() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let response = server
            .put(&member_path(fixture.family_id, fixture.member))
            .json(&json!({"role": "admin"}))
            .await;

        response.assert_status_ok();
        let members = response.json::<Value>();
        assert_eq!(members[1]["role"], "admin");
    }

    #[tokio::test]
    async fn only_admin_cannot_demote_themself() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let response = server
            .put(&member_path(fixture.family_id, fixture.admin))
            .json(&json!({"role": "member"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "last_admin");
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let response = server
            .put(&member_path(fixture.family_id, fixture.member))
            .json(&json!({"role": "owner"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn member_can_leave_and_is_reset_to_personal() {
        let fixture = get_fixture();
        {
            let connection = fixture.db_connection.lock().unwrap();
            let transaction = connection.unchecked_transaction().unwrap();
            switch_to_family(fixture.member, fixture.family_id, &transaction).unwrap();
            transaction.commit().unwrap();
        }
        let server = server_as(&fixture, fixture.member);

        server
            .delete(&member_path(fixture.family_id, fixture.member))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let connection = fixture.db_connection.lock().unwrap();
        assert_eq!(get_role(fixture.family_id, fixture.member, &connection), Ok(None));
        assert_eq!(resolve(fixture.member, &connection), Ok(EffectiveScope::Personal));
    }

    #[tokio::test]
    async fn member_cannot_remove_others() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.member);

        let response = server
            .delete(&member_path(fixture.family_id, fixture.admin))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"], "not_admin");
    }

    #[tokio::test]
    async fn last_admin_cannot_leave_while_others_remain() {
        let fixture = get_fixture();
        let server = server_as(&fixture, fixture.admin);

        let response = server
            .delete(&member_path(fixture.family_id, fixture.admin))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }
}
