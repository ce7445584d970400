//! Seeds the first administrator account.
//!
//! Approval requires an existing admin, so a fresh deployment needs one
//! account created out of band. Run once against the target database:
//!
//!   seed_admin --name "Dept Admin" --email admin@dept.example --password ...

use anyhow::Context;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use dept_desk::utils::{hash_password, utc_now};

#[derive(Parser, Debug)]
#[command(author, version, about = "create the initial admin account", long_about = None)]
struct Cli {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&cli.email)
        .fetch_optional(&pool)
        .await?;
    if existing.is_some() {
        anyhow::bail!("an account with email {} already exists", cli.email);
    }

    let password_hash = hash_password(&cli.password)?;
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, roles, status, disabled, overrides, approved_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, '["admin"]', 'active', 0, '{}', ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&cli.name)
    .bind(&cli.email)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    println!("created admin account {} ({})", cli.email, id);
    Ok(())
}
