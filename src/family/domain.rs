//! The family types shared by the family, scope and gateway modules.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PERSONAL_SCOPE_NAME, auth::UserID};

/// The longest family name, in characters.
pub const MAX_FAMILY_NAME_LENGTH: usize = 100;

/// A newtype wrapper for integer family IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(i64);

impl FamilyId {
    /// Create a new family ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the family ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for FamilyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for FamilyId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for FamilyId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(FamilyId)
    }
}

/// The name of a family.
///
/// A family name is never empty and is never the name of the Personal scope,
/// compared case-insensitively after trimming whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FamilyName(String);

impl FamilyName {
    /// Create and validate a family name. Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns an:
    /// - [Error::EmptyFamilyName] if `name` is empty or only whitespace,
    /// - [Error::FamilyNameTooLong] if `name` is longer than [MAX_FAMILY_NAME_LENGTH] characters,
    /// - [Error::ReservedFamilyName] if `name` is "Personal" in any letter case.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyFamilyName)
        } else if name.chars().count() > MAX_FAMILY_NAME_LENGTH {
            Err(Error::FamilyNameTooLong)
        } else if name.eq_ignore_ascii_case(PERSONAL_SCOPE_NAME) {
            Err(Error::ReservedFamilyName)
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    /// Create a family name without validation.
    ///
    /// The caller should ensure that the string is a valid family name, e.g.
    /// because it was read from the database.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for FamilyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for FamilyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FamilyName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<FamilyName> for String {
    fn from(value: FamilyName) -> Self {
        value.0
    }
}

impl ToSql for FamilyName {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for FamilyName {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(FamilyName::new_unchecked)
    }
}

/// A group of users that share a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: FamilyName,
    pub created_by: UserID,
    pub created_at: OffsetDateTime,
}

/// The role of a user within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May rename and delete the family, manage members and send invites.
    Admin,
    /// May read and write the family's records.
    Member,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(Error::InvalidRole(other.to_owned())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A family as listed for a user choosing where to switch to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilySummary {
    pub id: FamilyId,
    pub name: FamilyName,
    pub member_count: i64,
}

/// A user's membership of a family, with their email for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub user_id: UserID,
    pub email: String,
    pub role: Role,
    pub joined_at: OffsetDateTime,
}
