//! Invitations to join a family.
//!
//! An admin invites an email address and is given a token to pass on. The
//! user registered with that address accepts the invite with the token.
//! Sending email is left to the admin.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    DatabaseId, Error,
    auth::{UserID, get_user_by_id, normalize_email},
    db::in_transaction,
    family::{FamilyId, FamilyName, FamilyState, Role, add_member, get_family, require_admin},
    scope::{ScopeView, describe_scope, switch_to_family},
};

/// How long an invite can be accepted for.
pub const INVITE_LIFETIME: Duration = Duration::days(30);

/// Create the invite table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_invite_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS invite (
                id INTEGER PRIMARY KEY,
                family_id INTEGER NOT NULL REFERENCES family(id) ON DELETE CASCADE,
                invited_email TEXT NOT NULL,
                invited_by INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
                token TEXT NOT NULL UNIQUE,
                accepted INTEGER NOT NULL DEFAULT 0,
                accepted_by INTEGER REFERENCES user(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                accepted_at TEXT,
                expires_at TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_invite_email ON invite(invited_email)",
        (),
    )?;

    Ok(())
}

/// An invitation for an email address to join a family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invite {
    pub id: DatabaseId,
    pub family_id: FamilyId,
    /// The invited address, stored in lowercase.
    pub invited_email: String,
    pub invited_by: UserID,
    /// The role the invited user receives on joining.
    pub role: Role,
    /// The secret the invited user presents to accept.
    pub token: String,
    pub accepted: bool,
    pub accepted_by: Option<UserID>,
    pub created_at: OffsetDateTime,
    pub accepted_at: Option<OffsetDateTime>,
    pub expires_at: OffsetDateTime,
}

impl Invite {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    fn is_pending(&self, now: OffsetDateTime) -> bool {
        !self.accepted && !self.is_expired(now)
    }
}

/// A pending invite as shown to the invited user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedInvite {
    pub token: String,
    pub family_id: FamilyId,
    pub family_name: FamilyName,
    pub role: Role,
    pub expires_at: OffsetDateTime,
}

const INVITE_COLUMNS: &str = "id, family_id, invited_email, invited_by, role, token, accepted, \
    accepted_by, created_at, accepted_at, expires_at";

fn map_invite(row: &Row) -> Result<Invite, rusqlite::Error> {
    Ok(Invite {
        id: row.get(0)?,
        family_id: row.get(1)?,
        invited_email: row.get(2)?,
        invited_by: row.get(3)?,
        role: row.get(4)?,
        token: row.get(5)?,
        accepted: row.get(6)?,
        accepted_by: row.get(7)?,
        created_at: row.get(8)?,
        accepted_at: row.get(9)?,
        expires_at: row.get(10)?,
    })
}

fn is_member_by_email(
    family_id: FamilyId,
    email: &str,
    connection: &Connection,
) -> Result<bool, Error> {
    Ok(connection
        .query_row(
            "SELECT 1 FROM family_member
            INNER JOIN user ON user.id = family_member.user_id
            WHERE family_member.family_id = ?1 AND user.email = ?2",
            (family_id, email),
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn list_unaccepted(
    family_id: FamilyId,
    email: Option<&str>,
    connection: &Connection,
) -> Result<Vec<Invite>, Error> {
    let query = format!(
        "SELECT {INVITE_COLUMNS} FROM invite
        WHERE family_id = ?1 AND accepted = 0 AND (?2 IS NULL OR invited_email = ?2)
        ORDER BY created_at ASC, id ASC"
    );

    connection
        .prepare(&query)?
        .query_map((family_id, email), map_invite)?
        .map(|maybe_invite| maybe_invite.map_err(Error::from))
        .collect()
}

/// Invite `email` to join a family with `role`.
///
/// # Errors
///
/// Returns an:
/// - [Error::InvalidEmail] if `email` is not an email address,
/// - [Error::AlreadyMember] if the address belongs to a member of the family,
/// - [Error::DuplicateInvite] if the address already has a pending invite.
pub fn create_invite(
    family_id: FamilyId,
    invited_by: UserID,
    email: &str,
    role: Role,
    connection: &Connection,
) -> Result<Invite, Error> {
    let email = normalize_email(email)?;

    if is_member_by_email(family_id, &email, connection)? {
        return Err(Error::AlreadyMember);
    }

    let now = OffsetDateTime::now_utc();
    let has_pending = list_unaccepted(family_id, Some(&email), connection)?
        .iter()
        .any(|invite| invite.is_pending(now));
    if has_pending {
        return Err(Error::DuplicateInvite);
    }

    let token = Uuid::new_v4().to_string();
    let expires_at = now + INVITE_LIFETIME;

    connection.execute(
        "INSERT INTO invite (family_id, invited_email, invited_by, role, token, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (family_id, &email, invited_by, role, &token, now, expires_at),
    )?;

    Ok(Invite {
        id: connection.last_insert_rowid(),
        family_id,
        invited_email: email,
        invited_by,
        role,
        token,
        accepted: false,
        accepted_by: None,
        created_at: now,
        accepted_at: None,
        expires_at,
    })
}

/// List the invites of a family that can still be accepted.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_pending_invites(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<Invite>, Error> {
    let now = OffsetDateTime::now_utc();

    Ok(list_unaccepted(family_id, None, connection)?
        .into_iter()
        .filter(|invite| invite.is_pending(now))
        .collect())
}

/// List the pending invites addressed to `email`, from any family.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_invites_for_email(
    email: &str,
    connection: &Connection,
) -> Result<Vec<ReceivedInvite>, Error> {
    let now = OffsetDateTime::now_utc();
    let email = email.trim().to_lowercase();

    let invites = connection
        .prepare(
            "SELECT invite.token, invite.family_id, family.name, invite.role, invite.expires_at
            FROM invite
            INNER JOIN family ON family.id = invite.family_id
            WHERE invite.invited_email = ?1 AND invite.accepted = 0
            ORDER BY invite.created_at ASC, invite.id ASC",
        )?
        .query_map((&email,), |row| {
            Ok(ReceivedInvite {
                token: row.get(0)?,
                family_id: row.get(1)?,
                family_name: row.get(2)?,
                role: row.get(3)?,
                expires_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(invites
        .into_iter()
        .filter(|invite| invite.expires_at > now)
        .collect())
}

/// Withdraw an invite.
///
/// # Errors
///
/// Returns [Error::NotFound] if the family has no invite with `invite_id`.
pub fn delete_invite(
    family_id: FamilyId,
    invite_id: DatabaseId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM invite WHERE id = ?1 AND family_id = ?2",
        (invite_id, family_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn get_invite_by_token(token: &str, connection: &Connection) -> Result<Invite, Error> {
    connection
        .prepare(&format!("SELECT {INVITE_COLUMNS} FROM invite WHERE token = ?1"))?
        .query_row((token,), map_invite)
        .map_err(Error::from)
}

/// Accept the invite with `token` as `user_id`.
///
/// The user joins the family with the invite's role and is switched into it.
///
/// # Errors
///
/// Returns an:
/// - [Error::NotFound] if no invite has `token`,
/// - [Error::InviteEmailMismatch] if the invite is for another address,
/// - [Error::InviteAccepted] if the invite was already used,
/// - [Error::InviteExpired] if the invite is too old,
/// - [Error::AlreadyMember] if the user already belongs to the family.
pub fn accept_invite(
    token: &str,
    user_id: UserID,
    transaction: &Transaction,
) -> Result<ScopeView, Error> {
    let invite = get_invite_by_token(token, transaction)?;
    let user = get_user_by_id(user_id, transaction)?;

    if user.email != invite.invited_email {
        tracing::warn!(
            "User {user_id} tried to accept invite {} addressed to someone else",
            invite.id
        );
        return Err(Error::InviteEmailMismatch);
    }

    if invite.accepted {
        return Err(Error::InviteAccepted);
    }

    let now = OffsetDateTime::now_utc();
    if invite.is_expired(now) {
        return Err(Error::InviteExpired);
    }

    add_member(invite.family_id, user_id, invite.role, transaction)?;
    transaction.execute(
        "UPDATE invite SET accepted = 1, accepted_by = ?1, accepted_at = ?2 WHERE id = ?3",
        (user_id, now, invite.id),
    )?;
    tracing::info!(
        "User {user_id} joined family {} as {}",
        invite.family_id,
        invite.role
    );

    let scope = switch_to_family(user_id, invite.family_id, transaction)?;

    describe_scope(scope, transaction)
}

/// The body of a request to invite someone.
#[derive(Debug, Deserialize)]
pub struct InviteForm {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: Role,
}

fn default_invite_role() -> Role {
    Role::Member
}

/// Invite an email address to a family.
pub async fn create_invite_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
    Json(form): Json<InviteForm>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        create_invite(family_id, user_id, &form.email, form.role, transaction)
    })
    .map(|invite| (StatusCode::CREATED, Json(invite)))
    .into_response()
}

/// List a family's pending invites.
pub async fn list_invites_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(family_id): Path<FamilyId>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        list_pending_invites(family_id, transaction)
    })
    .map(Json)
    .into_response()
}

/// Withdraw one of a family's invites.
pub async fn delete_invite_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path((family_id, invite_id)): Path<(FamilyId, DatabaseId)>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        get_family(family_id, transaction)?;
        require_admin(family_id, user_id, transaction)?;
        delete_invite(family_id, invite_id, transaction)
    })
    .map(|()| StatusCode::NO_CONTENT)
    .into_response()
}

/// List the invites addressed to the caller.
pub async fn get_received_invites_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let user = get_user_by_id(user_id, transaction)?;
        list_invites_for_email(&user.email, transaction)
    })
    .map(Json)
    .into_response()
}

/// Accept an invite and switch into its family.
pub async fn accept_invite_endpoint(
    State(state): State<FamilyState>,
    Extension(user_id): Extension<UserID>,
    Path(token): Path<String>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        accept_invite(&token, user_id, transaction)
    })
    .map(Json)
    .into_response()
}

#[cfg(test)]
mod invite_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{PasswordHash, UserID, create_user},
        db::{begin, initialize},
        family::{FamilyId, FamilyName, Role, add_member, insert_family, membership::get_role},
        scope::{EffectiveScope, ScopeView, resolve},
    };

    use super::{
        accept_invite, create_invite, delete_invite, list_invites_for_email, list_pending_invites,
    };

    struct Fixture {
        connection: Connection,
        admin: UserID,
        invitee: UserID,
        family: FamilyId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let admin = create_user("admin@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let invitee = create_user("bob@example.com", PasswordHash::new_unchecked("x"), &connection)
            .unwrap()
            .id;
        let family = insert_family(FamilyName::new_unchecked("Smiths"), admin, &connection)
            .unwrap()
            .id;
        add_member(family, admin, Role::Admin, &connection).unwrap();

        Fixture {
            connection,
            admin,
            invitee,
            family,
        }
    }

    fn accept(fixture: &Fixture, token: &str, user_id: UserID) -> Result<ScopeView, Error> {
        let transaction = begin(&fixture.connection).unwrap();
        let result = accept_invite(token, user_id, &transaction);
        transaction.commit().unwrap();
        result
    }

    #[test]
    fn create_normalizes_email_and_sets_expiry() {
        let fixture = get_fixture();

        let invite = create_invite(
            fixture.family,
            fixture.admin,
            " Bob@Example.com ",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(invite.invited_email, "bob@example.com");
        assert!(!invite.accepted);
        assert_eq!(invite.expires_at - invite.created_at, Duration::days(30));
        let pending = list_pending_invites(fixture.family, &fixture.connection).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, invite.id);
        assert_eq!(pending[0].token, invite.token);
    }

    #[test]
    fn rejects_duplicate_pending_invite() {
        let fixture = get_fixture();
        create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();

        let result = create_invite(
            fixture.family,
            fixture.admin,
            "BOB@example.com",
            Role::Admin,
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::DuplicateInvite));
    }

    #[test]
    fn rejects_inviting_existing_member() {
        let fixture = get_fixture();

        let result = create_invite(
            fixture.family,
            fixture.admin,
            "admin@example.com",
            Role::Member,
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::AlreadyMember));
    }

    #[test]
    fn accepting_adds_member_with_role_and_switches_scope() {
        let fixture = get_fixture();
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Admin,
            &fixture.connection,
        )
        .unwrap();

        let view = accept(&fixture, &invite.token, fixture.invitee).unwrap();

        assert_eq!(
            view,
            ScopeView::Family {
                family_id: fixture.family,
                family_name: FamilyName::new_unchecked("Smiths"),
            }
        );
        assert_eq!(
            get_role(fixture.family, fixture.invitee, &fixture.connection),
            Ok(Some(Role::Admin))
        );
        assert_eq!(
            resolve(fixture.invitee, &fixture.connection),
            Ok(EffectiveScope::Family(fixture.family))
        );
        assert_eq!(
            list_pending_invites(fixture.family, &fixture.connection),
            Ok(vec![])
        );
    }

    #[test]
    fn accepting_twice_fails() {
        let fixture = get_fixture();
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();
        accept(&fixture, &invite.token, fixture.invitee).unwrap();

        assert_eq!(
            accept(&fixture, &invite.token, fixture.invitee),
            Err(Error::InviteAccepted)
        );
    }

    #[test]
    fn accepting_someone_elses_invite_fails() {
        let fixture = get_fixture();
        let stranger = create_user(
            "eve@example.com",
            PasswordHash::new_unchecked("x"),
            &fixture.connection,
        )
        .unwrap()
        .id;
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            accept(&fixture, &invite.token, stranger),
            Err(Error::InviteEmailMismatch)
        );
        assert_eq!(
            get_role(fixture.family, stranger, &fixture.connection),
            Ok(None)
        );
    }

    #[test]
    fn expired_invites_cannot_be_accepted_or_listed() {
        let fixture = get_fixture();
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();
        fixture
            .connection
            .execute(
                "UPDATE invite SET expires_at = ?1 WHERE id = ?2",
                (OffsetDateTime::now_utc() - Duration::days(1), invite.id),
            )
            .unwrap();

        assert_eq!(
            accept(&fixture, &invite.token, fixture.invitee),
            Err(Error::InviteExpired)
        );
        assert_eq!(
            list_invites_for_email("bob@example.com", &fixture.connection),
            Ok(vec![])
        );
        assert!(
            create_invite(
                fixture.family,
                fixture.admin,
                "bob@example.com",
                Role::Member,
                &fixture.connection,
            )
            .is_ok(),
            "an expired invite should not block a new one"
        );
    }

    #[test]
    fn received_invites_include_family_name() {
        let fixture = get_fixture();
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();

        let received = list_invites_for_email("Bob@example.com", &fixture.connection).unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].token, invite.token);
        assert_eq!(received[0].family_name, FamilyName::new_unchecked("Smiths"));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let fixture = get_fixture();

        assert_eq!(
            accept(&fixture, "not-a-token", fixture.invitee),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_only_removes_invites_of_the_family() {
        let fixture = get_fixture();
        let invite = create_invite(
            fixture.family,
            fixture.admin,
            "bob@example.com",
            Role::Member,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            delete_invite(FamilyId::new(999), invite.id, &fixture.connection),
            Err(Error::NotFound)
        );
        delete_invite(fixture.family, invite.id, &fixture.connection).unwrap();
        assert_eq!(
            list_pending_invites(fixture.family, &fixture.connection),
            Ok(vec![])
        );
    }
}
