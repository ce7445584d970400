//! User profile snapshot and lifecycle status resolution.
//!
//! `UserProfile` is the evaluator's view of one authenticated identity:
//! normalized roles, optional lifecycle flags, and per-user override maps.
//! It is built from a persisted document (see `models::profile`) or
//! assembled directly in tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::page::normalize_page_id;
use super::{Role, UserStatus};

/// Per-user grant/deny overrides. One location, one precedence rule: an
/// explicit boolean here beats the role table. Older profile documents
/// carried these maps under top-level `permissions`/`actions` keys; those
/// are folded in at ingest so the evaluator only ever consults this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default)]
    pub pages: BTreeMap<String, bool>,
    #[serde(default)]
    pub actions: BTreeMap<String, bool>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.actions.is_empty()
    }

    /// Build the canonical shape from loose maps (e.g. an API request).
    /// Page keys run through `normalize_page_id` so an override saved under
    /// a legacy spelling lands on the same key the evaluator looks up;
    /// first-seen wins when two spellings collapse to one.
    pub fn from_parts(pages: BTreeMap<String, bool>, actions: BTreeMap<String, bool>) -> Self {
        let mut overrides = ProfileOverrides::default();
        for (key, flag) in pages {
            overrides.insert_page(&key, flag);
        }
        for (key, flag) in actions {
            overrides.insert_action(&key, flag);
        }
        overrides
    }

    /// Ingest an override document. Accepts the current shape
    /// (`{"pages": {...}, "actions": {...}}`), a wrapper (`{"overrides":
    /// {...}}`), and the legacy top-level `permissions` map. When a key
    /// appears in more than one location the current shape wins. Page keys
    /// self-heal through the alias table, like the role table's.
    pub fn from_document(raw: &Value) -> Self {
        let mut overrides = ProfileOverrides::default();

        if let Some(nested) = raw.get("overrides") {
            overrides.absorb(nested);
        }
        overrides.absorb(raw);

        // Legacy location: `permissions` was the page override map before
        // the pages/actions split.
        if let Some(legacy) = raw.get("permissions").and_then(Value::as_object) {
            for (key, value) in legacy {
                if let Some(flag) = value.as_bool() {
                    overrides.insert_page(key, flag);
                }
            }
        }

        overrides
    }

    fn absorb(&mut self, raw: &Value) {
        if let Some(pages) = raw.get("pages").and_then(Value::as_object) {
            for (key, value) in pages {
                if let Some(flag) = value.as_bool() {
                    self.insert_page(key, flag);
                }
            }
        }
        if let Some(actions) = raw.get("actions").and_then(Value::as_object) {
            for (key, value) in actions {
                if let Some(flag) = value.as_bool() {
                    self.insert_action(key, flag);
                }
            }
        }
    }

    fn insert_page(&mut self, key: &str, flag: bool) {
        let key = normalize_page_id(key);
        if !key.is_empty() {
            self.pages.entry(key).or_insert(flag);
        }
    }

    fn insert_action(&mut self, key: &str, flag: bool) {
        let key = key.trim();
        if !key.is_empty() {
            self.actions.entry(key.to_string()).or_insert(flag);
        }
    }
}

/// Snapshot of one authenticated identity, as consumed by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub uid: Uuid,
    /// Normalized role list; unknown stored names have already been dropped.
    pub roles: Vec<Role>,
    /// Explicit lifecycle flag, if the record carries one.
    pub status: Option<UserStatus>,
    /// Hard disable switch; wins over `status`.
    pub disabled: Option<bool>,
    pub overrides: ProfileOverrides,
}

impl UserProfile {
    pub fn new(uid: Uuid) -> Self {
        Self {
            uid,
            roles: Vec::new(),
            status: None,
            disabled: None,
            overrides: ProfileOverrides::default(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_page_override(mut self, page: impl Into<String>, allowed: bool) -> Self {
        self.overrides.insert_page(&page.into(), allowed);
        self
    }

    pub fn with_action_override(mut self, action: impl Into<String>, allowed: bool) -> Self {
        self.overrides.actions.insert(action.into(), allowed);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn is_active(&self) -> bool {
        self.resolved_status() == UserStatus::Active
    }

    pub fn is_pending(&self) -> bool {
        self.resolved_status() == UserStatus::Pending
    }

    pub fn is_disabled(&self) -> bool {
        self.resolved_status() == UserStatus::Disabled
    }

    /// Lifecycle state with the documented precedence: the `disabled` flag
    /// is absolute, then an explicit `status`, then derivation from roles
    /// (no role assigned means the account was never approved).
    pub fn resolved_status(&self) -> UserStatus {
        if self.disabled == Some(true) {
            return UserStatus::Disabled;
        }
        if let Some(status) = self.status {
            return status;
        }
        if self.roles.is_empty() {
            UserStatus::Pending
        } else {
            UserStatus::Active
        }
    }
}

/// Resolve the lifecycle status of a possibly-missing profile. `None`
/// means "unknown identity"; callers must treat that as no access at all.
pub fn resolve_user_status(profile: Option<&UserProfile>) -> Option<UserStatus> {
    profile.map(UserProfile::resolved_status)
}

/// Canonicalize a raw role list from a stored document. Accepts a JSON
/// array of names, an object whose truthy values mark membership, or a
/// bare string. Order is preserved for arrays, duplicates collapse to the
/// first occurrence, and unrecognized names are dropped without error.
pub fn normalize_role_list(raw: &Value) -> Vec<Role> {
    let mut roles = Vec::new();
    let mut push = |role: Option<Role>| {
        if let Some(role) = role {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
    };

    match raw {
        Value::Array(entries) => {
            for entry in entries {
                push(entry.as_str().and_then(Role::parse));
            }
        }
        Value::Object(map) => {
            for (name, member) in map {
                let truthy = match member {
                    Value::Bool(flag) => *flag,
                    Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                    Value::String(s) => !s.is_empty(),
                    _ => false,
                };
                if truthy {
                    push(Role::parse(name));
                }
            }
        }
        Value::String(name) => push(Role::parse(name)),
        _ => {}
    }

    roles
}
