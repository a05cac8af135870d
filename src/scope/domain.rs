use serde::Serialize;

use crate::{
    auth::UserID,
    family::{FamilyId, FamilyName, FamilySummary},
};

/// The display name of the scope that holds a user's own records.
///
/// Personal is not a family and is never stored as one.
pub const PERSONAL_SCOPE_NAME: &str = "Personal";

/// The scope a request operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveScope {
    /// The user's own records, those with no family.
    Personal,
    /// The records of a family the user is a member of.
    Family(FamilyId),
}

impl EffectiveScope {
    /// The family of the scope, `None` for Personal.
    pub fn family_id(&self) -> Option<FamilyId> {
        match self {
            EffectiveScope::Personal => None,
            EffectiveScope::Family(family_id) => Some(*family_id),
        }
    }
}

/// The authenticated user and the scope resolved for their request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestScope {
    pub user_id: UserID,
    pub scope: EffectiveScope,
}

/// An [EffectiveScope] as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeView {
    Personal,
    Family {
        family_id: FamilyId,
        family_name: FamilyName,
    },
}

/// The scopes a user may switch to.
///
/// Personal is always available so it is a flag rather than an entry in `families`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchTargets {
    pub personal: bool,
    pub families: Vec<FamilySummary>,
}
