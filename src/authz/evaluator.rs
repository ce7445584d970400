//! Access evaluator.
//!
//! Two pure decision functions consumed by page guards and action buttons.
//! Decision order (first match wins):
//! 1. missing page/action or missing profile -> deny
//! 2. admin role -> allow (bypasses the lifecycle gate on purpose)
//! 3. not active -> deny
//! 4. per-user override -> that value, grant or deny
//! 5. missing role table -> warn and deny (fail closed)
//! 6. role grant, wildcard or exact -> allow
//! 7. deny
//!
//! Both functions are deterministic over their arguments: no I/O, no
//! mutation, safe to call from any number of concurrent render cycles.

use super::page::{normalize_page_id, strip_page_id};
use super::profile::UserProfile;
use super::registry::ActionKey;
use super::table::RolePermissionTable;
use super::{UserStatus, WILDCARD};

/// Can this user see the given page?
pub fn can_access_page(
    profile: Option<&UserProfile>,
    table: Option<&RolePermissionTable>,
    page_id: &str,
) -> bool {
    let normalized = normalize_page_id(page_id);
    if normalized.is_empty() {
        return false;
    }
    let Some(profile) = profile else {
        return false;
    };

    if profile.is_admin() {
        tracing::debug!(uid = %profile.uid, page = %normalized, "admin bypass");
        return true;
    }

    if profile.resolved_status() != UserStatus::Active {
        tracing::debug!(uid = %profile.uid, page = %normalized, "inactive account denied");
        return false;
    }

    // Explicit per-user override is authoritative, even to deny a page a
    // role would otherwise grant. Checked under both the canonical id and
    // the pre-alias spelling the caller supplied.
    let raw = strip_page_id(page_id);
    if let Some(flag) = profile
        .overrides
        .pages
        .get(&normalized)
        .or_else(|| profile.overrides.pages.get(&raw))
    {
        tracing::debug!(uid = %profile.uid, page = %normalized, allowed = flag, "page override");
        return *flag;
    }

    let Some(table) = table else {
        tracing::warn!(uid = %profile.uid, page = %normalized, "role-permission table missing, denying");
        return false;
    };

    for role in &profile.roles {
        if let Some(grant) = table.grant(*role) {
            if grant.allows_page(&normalized, &raw) {
                tracing::debug!(uid = %profile.uid, page = %normalized, role = %role, "role grant");
                return true;
            }
        }
    }

    false
}

/// Can this user perform the given action? Same shape as the page check,
/// over the `actions` maps; the wildcard `*` in a user override or role
/// grant covers every key, including ones never seen before.
pub fn can_perform_action(
    profile: Option<&UserProfile>,
    table: Option<&RolePermissionTable>,
    action: &ActionKey,
) -> bool {
    let key = action.as_str();
    if key.is_empty() {
        return false;
    }
    let Some(profile) = profile else {
        return false;
    };

    if profile.is_admin() {
        tracing::debug!(uid = %profile.uid, action = %key, "admin bypass");
        return true;
    }

    if profile.resolved_status() != UserStatus::Active {
        tracing::debug!(uid = %profile.uid, action = %key, "inactive account denied");
        return false;
    }

    // Exact override beats the wildcard override, both beat role grants.
    if let Some(flag) = profile
        .overrides
        .actions
        .get(key)
        .or_else(|| profile.overrides.actions.get(WILDCARD))
    {
        tracing::debug!(uid = %profile.uid, action = %key, allowed = flag, "action override");
        return *flag;
    }

    let Some(table) = table else {
        tracing::warn!(uid = %profile.uid, action = %key, "role-permission table missing, denying");
        return false;
    };

    for role in &profile.roles {
        if let Some(grant) = table.grant(*role) {
            if grant.allows_action(key) {
                tracing::debug!(uid = %profile.uid, action = %key, role = %role, "role grant");
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{normalize_role_permissions, Role};
    use serde_json::json;
    use uuid::Uuid;

    fn staff_table() -> RolePermissionTable {
        normalize_role_permissions(&json!({
            "staff": {
                "pages": {"scheduling/rooms": true},
                "actions": {"schedule.edit": true}
            }
        }))
    }

    fn active_staff() -> UserProfile {
        UserProfile::new(Uuid::new_v4())
            .with_roles([Role::Staff])
            .with_status(crate::authz::UserStatus::Active)
    }

    #[test]
    fn missing_inputs_deny() {
        let table = staff_table();
        assert!(!can_access_page(None, Some(&table), "scheduling/rooms"));
        assert!(!can_access_page(Some(&active_staff()), Some(&table), ""));
        assert!(!can_access_page(Some(&active_staff()), Some(&table), "  /  "));
    }

    #[test]
    fn admin_bypasses_status_and_table() {
        let admin = UserProfile::new(Uuid::new_v4())
            .with_roles([Role::Admin])
            .with_status(crate::authz::UserStatus::Disabled)
            .with_disabled(true);
        assert!(can_access_page(Some(&admin), None, "anything/at-all"));
        assert!(can_perform_action(Some(&admin), None, &ActionKey::new("nuke.it")));
    }

    #[test]
    fn pending_user_denied_before_role_lookup() {
        // Explicit pending status despite having a role: the active gate
        // runs before the role table is ever consulted.
        let pending = UserProfile::new(Uuid::new_v4())
            .with_roles([Role::Faculty])
            .with_status(crate::authz::UserStatus::Pending);
        let table = normalize_role_permissions(&json!({
            "faculty": {"pages": {"*": true}}
        }));
        assert!(!can_access_page(Some(&pending), Some(&table), "people/directory"));
    }

    #[test]
    fn disabled_user_denied() {
        let disabled = active_staff().with_disabled(true);
        let table = staff_table();
        assert!(!can_access_page(Some(&disabled), Some(&table), "scheduling/rooms"));
    }

    #[test]
    fn missing_table_fails_closed_for_non_admin() {
        assert!(!can_access_page(Some(&active_staff()), None, "scheduling/rooms"));
        assert!(!can_perform_action(
            Some(&active_staff()),
            None,
            &ActionKey::new("schedule.edit")
        ));
    }

    #[test]
    fn user_override_beats_role_wildcard_grant() {
        let table = normalize_role_permissions(&json!({
            "staff": {"pages": {"*": true}}
        }));
        let profile = active_staff().with_page_override("reports", false);
        assert!(!can_access_page(Some(&profile), Some(&table), "reports"));
        // Other pages still flow through the wildcard.
        assert!(can_access_page(Some(&profile), Some(&table), "people/directory"));
    }

    #[test]
    fn user_override_grants_without_role_grant() {
        let table = staff_table();
        let profile = active_staff().with_page_override("admin/access-control", true);
        assert!(can_access_page(Some(&profile), Some(&table), "admin/access-control"));
        // The override also matches when the caller uses the legacy alias.
        assert!(can_access_page(Some(&profile), Some(&table), "admin/access"));
    }

    #[test]
    fn deny_override_under_legacy_spelling_blocks_canonical_request() {
        // The deny was saved before the page rename; it must still beat a
        // role wildcard when the page is requested under its current id.
        let table = normalize_role_permissions(&json!({
            "staff": {"pages": {"*": true}}
        }));
        let profile = active_staff().with_page_override("schedule/rooms", false);
        assert!(!can_access_page(Some(&profile), Some(&table), "scheduling/rooms"));
        assert!(!can_access_page(Some(&profile), Some(&table), "schedule/rooms"));
    }

    #[test]
    fn role_grant_and_deny_by_default() {
        let table = staff_table();
        let profile = active_staff();
        assert!(can_access_page(Some(&profile), Some(&table), "scheduling/rooms"));
        assert!(!can_access_page(Some(&profile), Some(&table), "admin/settings"));
    }

    #[test]
    fn grant_keyed_by_canonical_id_matches_legacy_spelling() {
        let table = staff_table();
        let profile = active_staff();
        assert!(can_access_page(Some(&profile), Some(&table), "schedule/rooms"));
        assert!(can_access_page(Some(&profile), Some(&table), "/scheduling/rooms?week=3"));
    }

    #[test]
    fn grant_stored_under_legacy_spelling_still_matches() {
        // A table snapshot written before the rename and never
        // re-normalized: the raw request id is checked as a fallback.
        let profile = active_staff();
        let table: RolePermissionTable = serde_json::from_value(json!({
            "staff": {"pages": {"schedule/rooms": true}, "actions": {}}
        }))
        .expect("table deserializes");
        assert!(can_access_page(Some(&profile), Some(&table), "schedule/rooms"));
    }

    #[test]
    fn wildcard_action_grant_covers_unseen_keys() {
        let table = normalize_role_permissions(&json!({
            "staff": {"pages": {}, "actions": {"*": true}}
        }));
        let profile = active_staff();
        assert!(can_perform_action(
            Some(&profile),
            Some(&table),
            &ActionKey::new("brand.new.capability")
        ));
    }

    #[test]
    fn exact_action_override_beats_wildcard_override() {
        let table = staff_table();
        let profile = active_staff()
            .with_action_override("*", true)
            .with_action_override("schedule.edit", false);
        assert!(!can_perform_action(
            Some(&profile),
            Some(&table),
            &ActionKey::new("schedule.edit")
        ));
        assert!(can_perform_action(
            Some(&profile),
            Some(&table),
            &ActionKey::new("people.edit")
        ));
    }

    #[test]
    fn action_denied_without_grant() {
        let table = staff_table();
        let profile = active_staff();
        assert!(can_perform_action(
            Some(&profile),
            Some(&table),
            &ActionKey::new("schedule.edit")
        ));
        assert!(!can_perform_action(
            Some(&profile),
            Some(&table),
            &ActionKey::new("people.edit")
        ));
    }
}
