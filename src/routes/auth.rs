use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::store;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::profile::{Account, AuthResponse, LoginRequest, RegisterRequest};
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

/// First sign-in creates the profile in the pending state with no roles;
/// an admin has to approve the account before it can see anything.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, awaiting approval", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    if store::account_by_email(&state.pool, &payload.email).await?.is_some() {
        return Err(AppError::conflict("email already in use"));
    }

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, roles, status, disabled, overrides, created_at, updated_at)
        VALUES (?, ?, ?, ?, '[]', 'pending', NULL, '{}', ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_account = store::account_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::internal("account missing right after insert"))?;
    let account: Account = db_account.try_into()?;
    let token = state.jwt.encode(account.id)?;

    log_activity_with_context(
        &state.event_bus,
        "registered",
        Some(account.id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, account })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_account = store::account_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_account.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let account: Account = db_account.try_into()?;
    let token = state.jwt.encode(account.id)?;

    log_activity_with_context(
        &state.event_bus,
        "login",
        Some(account.id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(AuthResponse { token, account }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Current account with resolved status", body = Account))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Account>> {
    let db_account = store::account_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;
    Ok(Json(db_account.try_into()?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    if let Some(db_account) = store::account_by_id(&state.pool, auth.user_id).await? {
        let account: Account = db_account.try_into()?;
        log_activity(&state.event_bus, "logout", Some(auth.user_id), &account);
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
