//! Access-control panel and permission-check endpoints.
//!
//! The check endpoints are the evaluator's UI surface; everything else is
//! the admin screen: role-table edits, per-user overrides, and the account
//! lifecycle (approve / disable / enable). Every admin endpoint is guarded
//! through the evaluator itself via a well-known action key, so a
//! non-admin can be delegated panel access by role grant or override.
//! All mutations land in the activity log at Critical severity.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    actions, can_access_page, can_perform_action, normalize_page_id, normalize_role_list,
    normalize_role_permissions, ActionKey, Role, RolePermissionTable,
};
use crate::db::store;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::access::{
    ActionCheckQuery, ActionListResponse, CheckResponse, PageCheckQuery, PolicyChange,
    ToggleActionRequest, TogglePageRequest,
};
use crate::models::profile::{
    Account, ApproveRequest, DbAccount, OverridesUpdateRequest, SetRolesRequest,
};
use crate::utils::utc_now;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Decision functions exposed to UI components
        .route("/pages/check", get(check_page))
        .route("/actions/check", get(check_action))
        // Role-permission table
        .route("/role-permissions", get(get_role_permissions).put(replace_role_permissions))
        .route("/roles/:role/pages", post(toggle_role_page))
        .route("/roles/:role/actions", post(toggle_role_action))
        // Action registry listing for the grant screen
        .route("/actions", get(list_actions))
        // Accounts and lifecycle
        .route("/users", get(list_users))
        .route("/users/:user_id/approve", post(approve_user))
        .route("/users/:user_id/disable", post(disable_user))
        .route("/users/:user_id/enable", post(enable_user))
        .route("/users/:user_id/roles", put(set_user_roles))
        .route("/users/:user_id/overrides", put(set_user_overrides))
}

/// Load the caller's account and require the given action through the
/// evaluator. Registers the key as a side effect, like every check site.
async fn authorize(state: &AppState, auth: &AuthUser, action: &str) -> AppResult<DbAccount> {
    let db_account = store::account_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
    let profile = db_account.to_profile()?;

    let key = ActionKey::new(action);
    state.actions.register(&key);

    let table = store::load_role_table(&state.pool).await?;
    if can_perform_action(Some(&profile), table.as_ref(), &key) {
        Ok(db_account)
    } else {
        Err(AppError::forbidden(format!("requires action '{action}'")))
    }
}

fn parse_role(raw: &str) -> AppResult<Role> {
    Role::parse(raw).ok_or_else(|| AppError::not_found(format!("unknown role '{raw}'")))
}

async fn fetch_target(state: &AppState, user_id: Uuid) -> AppResult<DbAccount> {
    store::account_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))
}

// =============================================================================
// CHECK ENDPOINTS
// =============================================================================

/// Can the current user see a page?
#[utoipa::path(
    get,
    path = "/access/pages/check",
    tag = "Access",
    params(PageCheckQuery),
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Page visibility decision", body = CheckResponse))
)]
pub async fn check_page(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageCheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    let profile = match store::account_by_id(&state.pool, auth.user_id).await? {
        Some(db_account) => Some(db_account.to_profile()?),
        None => None,
    };
    let table = store::load_role_table(&state.pool).await?;

    let allowed = can_access_page(profile.as_ref(), table.as_ref(), &query.page);
    Ok(Json(CheckResponse { allowed }))
}

/// Can the current user perform an action? Asking registers the key.
#[utoipa::path(
    get,
    path = "/access/actions/check",
    tag = "Access",
    params(ActionCheckQuery),
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Action permission decision", body = CheckResponse))
)]
pub async fn check_action(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActionCheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    let key = ActionKey::new(query.action.as_str());
    state.actions.register(&key);

    let profile = match store::account_by_id(&state.pool, auth.user_id).await? {
        Some(db_account) => Some(db_account.to_profile()?),
        None => None,
    };
    let table = store::load_role_table(&state.pool).await?;

    let allowed = can_perform_action(profile.as_ref(), table.as_ref(), &key);
    Ok(Json(CheckResponse { allowed }))
}

// =============================================================================
// ROLE-PERMISSION TABLE
// =============================================================================

/// Current normalized role-permission table.
#[utoipa::path(
    get,
    path = "/access/role-permissions",
    tag = "Access",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Normalized role-permission table"))
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<RolePermissionTable>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;

    let table = store::load_role_table(&state.pool)
        .await?
        .unwrap_or_else(|| normalize_role_permissions(&Value::Null));
    Ok(Json(table))
}

/// Replace the whole table. Accepts legacy flat role maps as well as the
/// split pages/actions shape; what gets persisted is the normalized form.
#[utoipa::path(
    put,
    path = "/access/role-permissions",
    tag = "Access",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Normalized role-permission table as persisted"))
)]
pub async fn replace_role_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(raw): Json<Value>,
) -> AppResult<Json<RolePermissionTable>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;

    let table = normalize_role_permissions(&raw);
    let document = store::save_role_table(&state.pool, &table, utc_now()).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated_policy",
        Some(auth.user_id),
        &PolicyChange { document },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(table))
}

/// Toggle one page grant for one role.
#[utoipa::path(
    post,
    path = "/access/roles/{role}/pages",
    tag = "Access",
    params(("role" = String, Path, description = "Role name")),
    request_body = TogglePageRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Updated table"),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn toggle_role_page(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role): Path<String>,
    Json(req): Json<TogglePageRequest>,
) -> AppResult<Json<RolePermissionTable>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;
    let role = parse_role(&role)?;

    if normalize_page_id(&req.page_id).is_empty() {
        return Err(AppError::bad_request("page id required"));
    }

    let mut table = store::load_role_table(&state.pool)
        .await?
        .unwrap_or_else(|| normalize_role_permissions(&Value::Null));
    table.set_page(role, &req.page_id, req.allowed);

    let document = store::save_role_table(&state.pool, &table, utc_now()).await?;
    log_activity_with_context(
        &state.event_bus,
        "updated_policy",
        Some(auth.user_id),
        &PolicyChange { document },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(table))
}

/// Toggle one action grant for one role. The key is registered so it shows
/// up in the grant screen even if no call site has checked it yet.
#[utoipa::path(
    post,
    path = "/access/roles/{role}/actions",
    tag = "Access",
    params(("role" = String, Path, description = "Role name")),
    request_body = ToggleActionRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Updated table"),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn toggle_role_action(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role): Path<String>,
    Json(req): Json<ToggleActionRequest>,
) -> AppResult<Json<RolePermissionTable>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;
    let role = parse_role(&role)?;

    let key = ActionKey::new(req.action.as_str());
    if key.is_empty() {
        return Err(AppError::bad_request("action key required"));
    }
    state.actions.register(&key);

    let mut table = store::load_role_table(&state.pool)
        .await?
        .unwrap_or_else(|| normalize_role_permissions(&Value::Null));
    table.set_action(role, key.as_str(), req.allowed);

    let document = store::save_role_table(&state.pool, &table, utc_now()).await?;
    log_activity_with_context(
        &state.event_bus,
        "updated_policy",
        Some(auth.user_id),
        &PolicyChange { document },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(table))
}

/// Every action key the running process has seen, in first-use order.
#[utoipa::path(
    get,
    path = "/access/actions",
    tag = "Access",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Registered action keys", body = ActionListResponse))
)]
pub async fn list_actions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ActionListResponse>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;

    let actions = state
        .actions
        .keys()
        .iter()
        .map(|key| key.as_str().to_string())
        .collect();
    Ok(Json(ActionListResponse { actions }))
}

// =============================================================================
// ACCOUNTS & LIFECYCLE
// =============================================================================

/// Directory of all accounts with resolved statuses.
#[utoipa::path(
    get,
    path = "/access/users",
    tag = "Access",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "All accounts", body = Vec<Account>))
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Account>>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;

    let accounts = store::list_accounts(&state.pool)
        .await?
        .into_iter()
        .map(Account::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(accounts))
}

/// Approve a pending account: assigns exactly one role, activates the
/// account, and stamps the approver, all in a single write.
#[utoipa::path(
    post,
    path = "/access/users/{user_id}/approve",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Account ID")),
    request_body = ApproveRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Approved account", body = Account),
        (status = 409, description = "Account is not pending")
    )
)]
pub async fn approve_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> AppResult<Json<Account>> {
    authorize(&state, &auth, actions::USERS_APPROVE).await?;

    let target = fetch_target(&state, user_id).await?;
    if !target.to_profile()?.is_pending() {
        return Err(AppError::conflict("account is not pending approval"));
    }

    let now = utc_now();
    let roles_json = serde_json::to_string(&vec![req.role])?;

    sqlx::query(
        "UPDATE users SET roles = ?, status = 'active', approved_by = ?, approved_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&roles_json)
    .bind(auth.user_id.to_string())
    .bind(now)
    .bind(now)
    .bind(user_id.to_string())
    .execute(&state.pool)
    .await?;

    let account: Account = fetch_target(&state, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "approved",
        Some(auth.user_id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(account))
}

/// Disable an account (works for active and never-approved pending ones).
#[utoipa::path(
    post,
    path = "/access/users/{user_id}/disable",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Account ID")),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Disabled account", body = Account),
        (status = 403, description = "Cannot disable your own account"),
        (status = 409, description = "Already disabled")
    )
)]
pub async fn disable_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    authorize(&state, &auth, actions::USERS_DISABLE).await?;

    // Lockout guard: an admin cannot disable the account they are using.
    if user_id == auth.user_id {
        return Err(AppError::forbidden("cannot disable your own account"));
    }

    let target = fetch_target(&state, user_id).await?;
    if target.to_profile()?.is_disabled() {
        return Err(AppError::conflict("account is already disabled"));
    }
    let old: Account = target.try_into()?;

    sqlx::query("UPDATE users SET status = 'disabled', disabled = 1, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    let account: Account = fetch_target(&state, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "disabled",
        Some(auth.user_id),
        &account,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(account))
}

/// Re-enable a disabled account. Only approved accounts can come back this
/// way; a disabled never-approved account must go through approve.
#[utoipa::path(
    post,
    path = "/access/users/{user_id}/enable",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Account ID")),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Re-enabled account", body = Account),
        (status = 409, description = "Account is not disabled, or was never approved")
    )
)]
pub async fn enable_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    authorize(&state, &auth, actions::USERS_DISABLE).await?;

    let target = fetch_target(&state, user_id).await?;
    let profile = target.to_profile()?;
    if !profile.is_disabled() {
        return Err(AppError::conflict("account is not disabled"));
    }
    if profile.roles.is_empty() {
        return Err(AppError::conflict("account was never approved; approve it instead"));
    }
    let old: Account = target.try_into()?;

    sqlx::query("UPDATE users SET status = 'active', disabled = 0, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    let account: Account = fetch_target(&state, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "enabled",
        Some(auth.user_id),
        &account,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(account))
}

/// Replace an account's role set.
#[utoipa::path(
    put,
    path = "/access/users/{user_id}/roles",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Account ID")),
    request_body = SetRolesRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Account with updated roles", body = Account),
        (status = 400, description = "No valid roles in the request"),
        (status = 403, description = "Cannot remove your own admin role"),
        (status = 409, description = "Account is still pending")
    )
)]
pub async fn set_user_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetRolesRequest>,
) -> AppResult<Json<Account>> {
    authorize(&state, &auth, actions::USERS_ROLES_EDIT).await?;

    let roles = normalize_role_list(&serde_json::to_value(&req.roles)?);
    if roles.is_empty() {
        return Err(AppError::bad_request(
            "at least one valid role required; disable the account instead",
        ));
    }

    let target = fetch_target(&state, user_id).await?;
    let profile = target.to_profile()?;
    if profile.is_pending() {
        return Err(AppError::conflict("account is pending; approve it first"));
    }

    // Lockout guard: an admin cannot demote the account they are using.
    if user_id == auth.user_id && profile.is_admin() && !roles.contains(&Role::Admin) {
        return Err(AppError::forbidden("cannot remove your own admin role"));
    }
    let old: Account = target.try_into()?;

    sqlx::query("UPDATE users SET roles = ?, updated_at = ? WHERE id = ?")
        .bind(serde_json::to_string(&roles)?)
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    let account: Account = fetch_target(&state, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "roles_changed",
        Some(auth.user_id),
        &account,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(account))
}

/// Replace an account's per-user override maps.
#[utoipa::path(
    put,
    path = "/access/users/{user_id}/overrides",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Account ID")),
    request_body = OverridesUpdateRequest,
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Account with updated overrides", body = Account))
)]
pub async fn set_user_overrides(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<OverridesUpdateRequest>,
) -> AppResult<Json<Account>> {
    authorize(&state, &auth, actions::ACCESS_MANAGE).await?;

    let target = fetch_target(&state, user_id).await?;
    let old: Account = target.try_into()?;

    // Page keys are canonicalized on write so a deny saved under a legacy
    // spelling still matches the canonical lookup.
    let overrides = crate::authz::ProfileOverrides::from_parts(req.pages, req.actions);

    sqlx::query("UPDATE users SET overrides = ?, updated_at = ? WHERE id = ?")
        .bind(serde_json::to_string(&overrides)?)
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    let account: Account = fetch_target(&state, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "overrides_changed",
        Some(auth.user_id),
        &account,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(account))
}
