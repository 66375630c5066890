//! Claimdesk — application entry point.
//!
//! Loads configuration, opens and migrates the store and makes sure an
//! administrator account exists. The desktop front end links the library
//! crates directly; this binary prepares the database it will use.

mod config;

use anyhow::Context;
use claimdesk_core::models::user::{Actor, CreateUser, Role};
use claimdesk_core::repository::UserRepository;
use claimdesk_db::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The directive's target is a prefix, so it covers every claimdesk_* crate.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("claimdesk=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Claimdesk...");

    let config = AppConfig::load().context("loading configuration")?;
    let auth = config.auth_config().context("reading security settings")?;
    let db_config = config.db_config();

    let db = Database::open(&db_config, auth)
        .await
        .with_context(|| format!("opening database at {}", db_config.path.display()))?;
    info!(
        path = %db_config.path.display(),
        max_connections = db_config.max_connections,
        "Database ready"
    );

    bootstrap_admin(&db, &config).await?;

    db.close().await;
    info!("Claimdesk stopped.");
    Ok(())
}

/// Create the first administrator when no accounts exist yet.
async fn bootstrap_admin(db: &Database, config: &AppConfig) -> anyhow::Result<()> {
    let users = db.users();
    if users.count().await? > 0 {
        return Ok(());
    }

    let Some(password) = config.bootstrap.admin_password.clone() else {
        warn!(
            setting = "CLAIMDESK__BOOTSTRAP__ADMIN_PASSWORD",
            "No user accounts exist and no bootstrap password is set"
        );
        return Ok(());
    };

    let admin = users
        .create(
            &Actor::system(),
            CreateUser {
                username: config.bootstrap.admin_username.clone(),
                password,
                role: Role::Admin,
                branch_id: None,
            },
        )
        .await
        .context("creating bootstrap administrator")?;
    info!(user_id = admin.id, username = %admin.username, "Bootstrap administrator created");
    Ok(())
}
