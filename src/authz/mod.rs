//! Authorization core - two-tier page and action access control
//!
//! This module implements the department dashboard's permission model:
//! - Role defaults: a singleton role-permission table mapping each fixed
//!   role to page and action grants (wildcard `*` supported)
//! - Per-user overrides: explicit booleans on the profile that beat the
//!   role table for a specific page or action
//! - Lifecycle gating: pending and disabled accounts are denied everything
//!   (admins bypass the gate so an admin account can never lock itself out)
//!
//! Everything here is pure and synchronous; persistence and HTTP live in
//! `models` and `routes`.

mod evaluator;
mod page;
mod profile;
mod registry;
mod table;

pub use evaluator::{can_access_page, can_perform_action};
pub use page::{normalize_page_id, strip_page_id};
pub use profile::{normalize_role_list, resolve_user_status, ProfileOverrides, UserProfile};
pub use registry::{ActionKey, ActionRegistry};
pub use table::{normalize_role_permissions, RoleGrant, RolePermissionTable};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wildcard key granting every page or action within a pages/actions map.
pub const WILDCARD: &str = "*";

/// Fixed role set. Wire names are load-bearing: stored documents and the
/// admin UI both use the lowercase spellings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Faculty,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Staff, Role::Faculty];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Faculty => "faculty",
        }
    }

    /// Parse a stored role name. Unknown names yield `None`; callers drop
    /// them silently so data written under future role names keeps loading.
    pub fn parse(raw: &str) -> Option<Role> {
        let raw = raw.trim();
        Role::ALL
            .into_iter()
            .find(|role| raw.eq_ignore_ascii_case(role.as_str()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account lifecycle state. `disabled` wins over everything, an explicit
/// `status` field wins over derivation, and legacy records without a
/// status derive it from whether any role was ever assigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }

    pub fn parse(raw: &str) -> Option<UserStatus> {
        match raw.trim() {
            "pending" => Some(UserStatus::Pending),
            "active" => Some(UserStatus::Active),
            "disabled" => Some(UserStatus::Disabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known action keys referenced by the route layer. New keys come into
/// existence by being checked; these are just the ones the server itself
/// guards with, registered up front so the admin grant screen is never
/// empty on a fresh install.
pub mod actions {
    pub const ACCESS_MANAGE: &str = "access.manage";
    pub const USERS_APPROVE: &str = "users.approve";
    pub const USERS_DISABLE: &str = "users.disable";
    pub const USERS_ROLES_EDIT: &str = "users.roles.edit";
    pub const SCHEDULE_EDIT: &str = "schedule.edit";
    pub const ROOMS_EDIT: &str = "rooms.edit";
    pub const PEOPLE_EDIT: &str = "people.edit";
    pub const EMAIL_LISTS_EXPORT: &str = "email-lists.export";
    pub const TUTORIALS_EDIT: &str = "tutorials.edit";
}

/// Bulk-register the server's own action keys. Run once at startup.
pub fn register_known_actions(registry: &ActionRegistry) {
    for key in [
        actions::ACCESS_MANAGE,
        actions::USERS_APPROVE,
        actions::USERS_DISABLE,
        actions::USERS_ROLES_EDIT,
        actions::SCHEDULE_EDIT,
        actions::ROOMS_EDIT,
        actions::PEOPLE_EDIT,
        actions::EMAIL_LISTS_EXPORT,
        actions::TUTORIALS_EDIT,
    ] {
        registry.register(&ActionKey::new(key));
    }
}
