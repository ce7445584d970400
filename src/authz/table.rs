//! Role-permission table normalization.
//!
//! The table is persisted as one JSON document keyed by role name. Two
//! shapes exist in the wild: the current split form
//! `{"pages": {...}, "actions": {...}}` and a legacy flat form where the
//! role's value is the page map itself. Ingest classifies each role's
//! value into an explicit variant before converting, instead of
//! re-detecting shape at every lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::page::normalize_page_id;
use super::{Role, WILDCARD};

/// One role's grants after normalization. Both maps always serialize, so a
/// normalized document round-trips through classification unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub pages: BTreeMap<String, bool>,
    pub actions: BTreeMap<String, bool>,
}

impl RoleGrant {
    pub fn allows_page(&self, normalized: &str, raw: &str) -> bool {
        if self.pages.get(WILDCARD).copied().unwrap_or(false) {
            return true;
        }
        if self.pages.get(normalized).copied().unwrap_or(false) {
            return true;
        }
        // Tolerate grants stored under a pre-rename spelling.
        !raw.is_empty() && raw != normalized && self.pages.get(raw).copied().unwrap_or(false)
    }

    pub fn allows_action(&self, key: &str) -> bool {
        self.actions.get(WILDCARD).copied().unwrap_or(false)
            || self.actions.get(key).copied().unwrap_or(false)
    }
}

/// Complete normalized table: every fixed role has an entry, and the admin
/// role is never left without a wildcard grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePermissionTable {
    grants: BTreeMap<Role, RoleGrant>,
}

impl RolePermissionTable {
    pub fn grant(&self, role: Role) -> Option<&RoleGrant> {
        self.grants.get(&role)
    }

    pub fn set_page(&mut self, role: Role, page_id: &str, allowed: bool) {
        let key = normalize_page_id(page_id);
        if key.is_empty() {
            return;
        }
        self.grants.entry(role).or_default().pages.insert(key, allowed);
    }

    pub fn set_action(&mut self, role: Role, action: &str, allowed: bool) {
        let key = action.trim();
        if key.is_empty() {
            return;
        }
        self.grants
            .entry(role)
            .or_default()
            .actions
            .insert(key.to_string(), allowed);
    }

    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Classified raw shape for one role's stored value.
#[derive(Debug, Clone, PartialEq)]
enum RawRoleGrant {
    /// Current form: explicit `pages` and/or `actions` submaps.
    Split { pages: Value, actions: Value },
    /// Legacy form: the object itself is the page map.
    Flat(Value),
}

fn classify_grant(value: &Value) -> Option<RawRoleGrant> {
    let object = value.as_object()?;
    if object.contains_key("pages") || object.contains_key("actions") {
        Some(RawRoleGrant::Split {
            pages: object.get("pages").cloned().unwrap_or(Value::Null),
            actions: object.get("actions").cloned().unwrap_or(Value::Null),
        })
    } else {
        Some(RawRoleGrant::Flat(value.clone()))
    }
}

/// Copy a JSON object of booleans, dropping non-boolean values and, when
/// `canonicalize_pages` is set, rewriting keys through the page alias
/// table. First-seen value wins when two keys collapse to one.
fn bool_map(raw: &Value, canonicalize_pages: bool) -> BTreeMap<String, bool> {
    let mut map = BTreeMap::new();
    if let Some(object) = raw.as_object() {
        for (key, value) in object {
            let Some(flag) = value.as_bool() else { continue };
            let key = if canonicalize_pages {
                normalize_page_id(key)
            } else {
                key.trim().to_string()
            };
            if key.is_empty() {
                continue;
            }
            map.entry(key).or_insert(flag);
        }
    }
    map
}

/// Normalize a persisted (possibly partial or legacy) table document into
/// the complete shape. Idempotent: feeding the serialized output back in
/// yields an equal table.
pub fn normalize_role_permissions(raw: &Value) -> RolePermissionTable {
    let mut grants = BTreeMap::new();

    for role in Role::ALL {
        let grant = match raw.get(role.as_str()).and_then(classify_grant) {
            Some(RawRoleGrant::Split { pages, actions }) => RoleGrant {
                pages: bool_map(&pages, true),
                actions: bool_map(&actions, false),
            },
            Some(RawRoleGrant::Flat(pages)) => RoleGrant {
                pages: bool_map(&pages, true),
                actions: BTreeMap::new(),
            },
            None => RoleGrant::default(),
        };
        grants.insert(role, grant);
    }

    // Admins must never be locked out by missing configuration.
    let admin = grants.entry(Role::Admin).or_default();
    if admin.pages.is_empty() {
        admin.pages.insert(WILDCARD.to_string(), true);
    }
    if admin.actions.is_empty() {
        admin.actions.insert(WILDCARD.to_string(), true);
    }

    RolePermissionTable { grants }
}
