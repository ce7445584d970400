//! End-to-end coverage of the permission-check endpoints and the
//! role-permission table admin surface.

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use uuid::Uuid;

use dept_desk::create_app;
use dept_desk::utils::hash_password;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-pass-123";

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_access.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((app, pool, dir))
}

async fn seed_admin(pool: &SqlitePool) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, roles, status, disabled, overrides, created_at, updated_at)
        VALUES (?, 'Admin', ?, ?, '["admin"]', 'active', 0, '{}', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(ADMIN_EMAIL)
    .bind(hash_password(ADMIN_PASSWORD)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    Ok(builder.body(body)?)
}

async fn body_json(resp: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let req = request("POST", "/auth/login", None, Some(json!({"email": email, "password": password})))?;
    let resp = app.clone().oneshot(req).await?;
    anyhow::ensure!(resp.status() == StatusCode::OK, "login failed for {email}");
    let body = body_json(resp).await?;
    Ok(body["token"].as_str().context("token missing")?.to_string())
}

/// Register a user and have the admin approve them into the given role.
/// Returns (user_token, user_id).
async fn approved_user(
    app: &Router,
    admin_token: &str,
    email: &str,
    role: &str,
) -> Result<(String, Uuid)> {
    let req = request(
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Test User", "email": email, "password": "password123"})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    anyhow::ensure!(resp.status() == StatusCode::CREATED);
    let body = body_json(resp).await?;
    let token = body["token"].as_str().context("token missing")?.to_string();
    let user_id: Uuid = body["account"]["id"].as_str().context("id missing")?.parse()?;

    let req = request(
        "POST",
        &format!("/access/users/{user_id}/approve"),
        Some(admin_token),
        Some(json!({"role": role})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    anyhow::ensure!(resp.status() == StatusCode::OK, "approve failed");

    Ok((token, user_id))
}

#[tokio::test]
async fn legacy_flat_table_is_persisted_normalized() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    // Old UI shape: role maps straight to a page map, alias spellings included.
    let legacy = json!({
        "staff": {
            "schedule/rooms": true,
            "people/people-directory": true,
            "admin/access-control": false
        }
    });
    let req = request("PUT", "/access/role-permissions", Some(&admin_token), Some(legacy))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = request("GET", "/access/role-permissions", Some(&admin_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let table = body_json(resp).await?;

    // Aliases are rewritten to canonical ids and the shape is split.
    assert_eq!(table["staff"]["pages"]["scheduling/rooms"], true);
    assert_eq!(table["staff"]["pages"]["people/directory"], true);
    assert_eq!(table["staff"]["pages"]["admin/access-control"], false);
    assert!(table["staff"]["actions"].as_object().context("actions missing")?.is_empty());

    // Admin keeps its wildcard backstop; all roles are materialized.
    assert_eq!(table["admin"]["pages"]["*"], true);
    assert_eq!(table["admin"]["actions"]["*"], true);
    assert!(table["faculty"].is_object());

    Ok(())
}

#[tokio::test]
async fn page_checks_follow_the_table_and_aliases() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (staff_token, _) = approved_user(&app, &admin_token, "staff@example.com", "staff").await?;

    let req = request(
        "POST",
        "/access/roles/staff/pages",
        Some(&admin_token),
        Some(json!({"page_id": "scheduling/overview", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Request spelled with leading slash, legacy alias, and a query string.
    let req = request(
        "GET",
        "/access/pages/check?page=%2Fschedule%2Foverview%3Ftab%3Dweek",
        Some(&staff_token),
        None,
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], true);

    // Nothing grants this one.
    let req = request("GET", "/access/pages/check?page=admin/access-control", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], false);

    // Admin sees everything without any grant.
    let req = request("GET", "/access/pages/check?page=admin/access-control", Some(&admin_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn action_check_registers_the_key() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (staff_token, _) = approved_user(&app, &admin_token, "staff@example.com", "staff").await?;

    // Unseen key: denied for staff, but the ask records it.
    let req = request("GET", "/access/actions/check?action=grades.override", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], false);

    let req = request("GET", "/access/actions", Some(&admin_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    let actions: Vec<&str> = body["actions"]
        .as_array()
        .context("actions missing")?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(actions.contains(&"grades.override"));
    // Code-declared keys are seeded at boot.
    assert!(actions.contains(&"access.manage"));

    // Granting the role the action flips the answer.
    let req = request(
        "POST",
        "/access/roles/staff/actions",
        Some(&admin_token),
        Some(json!({"action": "grades.override", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = request("GET", "/access/actions/check?action=grades.override", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn user_override_beats_role_grant() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (staff_token, staff_id) =
        approved_user(&app, &admin_token, "staff@example.com", "staff").await?;

    // Role says yes, override says no.
    let req = request(
        "POST",
        "/access/roles/staff/pages",
        Some(&admin_token),
        Some(json!({"page_id": "scheduling/rooms", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = request(
        "PUT",
        &format!("/access/users/{staff_id}/overrides"),
        Some(&admin_token),
        Some(json!({"pages": {"scheduling/rooms": false}})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = request("GET", "/access/pages/check?page=scheduling/rooms", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], false);

    // Override can also grant a page no role gives.
    let req = request(
        "PUT",
        &format!("/access/users/{staff_id}/overrides"),
        Some(&admin_token),
        Some(json!({"pages": {"tutorials": true}})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Asked via the legacy alias spelling.
    let req = request("GET", "/access/pages/check?page=help/tutorials", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn deny_override_saved_under_legacy_spelling_still_denies() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (staff_token, staff_id) =
        approved_user(&app, &admin_token, "staff@example.com", "staff").await?;

    // Staff gets everything by wildcard.
    let req = request(
        "POST",
        "/access/roles/staff/pages",
        Some(&admin_token),
        Some(json!({"page_id": "*", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // The deny is saved under the pre-rename spelling.
    let req = request(
        "PUT",
        &format!("/access/users/{staff_id}/overrides"),
        Some(&admin_token),
        Some(json!({"pages": {"schedule/rooms": false}})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    // Persisted under the canonical key.
    assert_eq!(body["overrides"]["pages"]["scheduling/rooms"], false);

    // Both spellings are denied; the wildcard does not win.
    for page in ["scheduling/rooms", "schedule/rooms"] {
        let req = request(
            "GET",
            &format!("/access/pages/check?page={page}"),
            Some(&staff_token),
            None,
        )?;
        let resp = app.clone().oneshot(req).await?;
        let body = body_json(resp).await?;
        assert_eq!(body["allowed"], false, "page {page} should be denied");
    }

    // Unrelated pages still flow through the wildcard.
    let req = request("GET", "/access/pages/check?page=people/directory", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    let body = body_json(resp).await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn panel_requires_the_manage_action() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (staff_token, _) = approved_user(&app, &admin_token, "staff@example.com", "staff").await?;

    let req = request("GET", "/access/role-permissions", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = request("GET", "/access/users", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // No token at all.
    let req = request("GET", "/access/role-permissions", None, None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Delegation: grant staff the manage action and the panel opens up.
    let req = request(
        "POST",
        "/access/roles/staff/actions",
        Some(&admin_token),
        Some(json!({"action": "access.manage", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = request("GET", "/access/role-permissions", Some(&staff_token), None)?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn unknown_role_and_blank_page_are_rejected() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    seed_admin(&pool).await?;
    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    let req = request(
        "POST",
        "/access/roles/superuser/pages",
        Some(&admin_token),
        Some(json!({"page_id": "scheduling/rooms", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = request(
        "POST",
        "/access/roles/staff/pages",
        Some(&admin_token),
        Some(json!({"page_id": "   ", "allowed": true})),
    )?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
