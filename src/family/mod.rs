//! Families, their members and invitations.

mod create;
mod db;
mod domain;
mod invite;
mod manage;
mod members;
mod membership;

pub use create::create_family_endpoint;
pub use db::{create_family_table, delete_family, get_family, insert_family, rename_family};
pub use domain::{Family, FamilyId, FamilyName, FamilySummary, Member, Role};
pub use invite::{
    accept_invite_endpoint, create_invite_endpoint, create_invite_table,
    delete_invite_endpoint, get_received_invites_endpoint, list_invites_endpoint,
};
pub use manage::{
    FamilyState, delete_family_endpoint, get_family_endpoint, import_into_family_endpoint,
    rename_family_endpoint,
};
pub use members::{remove_member_endpoint, set_member_role_endpoint};
pub use membership::{
    add_member, create_family_member_table, is_member, list_families_for_user,
    list_members, remove_member, require_admin, require_member, set_role,
};
