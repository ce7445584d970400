//! Query helpers over the document-shaped tables.
//!
//! Accounts and the role-permission table are stored as rows carrying JSON
//! text columns; these helpers are the only place SQL for them lives. The
//! role table is written back as a fully-normalized document, never as a
//! field-level patch.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{normalize_role_permissions, RolePermissionTable};
use crate::errors::AppResult;
use crate::models::profile::DbAccount;

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, roles, status, disabled, overrides, approved_by, approved_at, created_at, updated_at";

pub async fn account_by_id(pool: &SqlitePool, id: Uuid) -> AppResult<Option<DbAccount>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?");
    let account = sqlx::query_as::<_, DbAccount>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

pub async fn account_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbAccount>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = ?");
    let account = sqlx::query_as::<_, DbAccount>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

pub async fn list_accounts(pool: &SqlitePool) -> AppResult<Vec<DbAccount>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at, email");
    let accounts = sqlx::query_as::<_, DbAccount>(&sql).fetch_all(pool).await?;
    Ok(accounts)
}

/// Raw role-permission document as persisted, if any.
pub async fn load_policy_document(pool: &SqlitePool) -> AppResult<Option<Value>> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT document FROM access_policies WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

/// Normalized role-permission table, or `None` when the singleton row has
/// never been written (the evaluator fails closed on that).
pub async fn load_role_table(pool: &SqlitePool) -> AppResult<Option<RolePermissionTable>> {
    Ok(load_policy_document(pool)
        .await?
        .map(|doc| normalize_role_permissions(&doc)))
}

/// Persist the normalized table verbatim and return the stored document.
pub async fn save_role_table(
    pool: &SqlitePool,
    table: &RolePermissionTable,
    now: DateTime<Utc>,
) -> AppResult<Value> {
    let document = table.to_document();
    let serialized = serde_json::to_string(&document)?;

    sqlx::query(
        r#"
        INSERT INTO access_policies (id, document, updated_at) VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at
        "#,
    )
    .bind(&serialized)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(document)
}
