//! Application configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. `claimdesk.toml` in the working directory, if present
//! 3. environment variables prefixed `CLAIMDESK__`, with `__` separating
//!    sections (`CLAIMDESK__DATABASE__PATH`, `CLAIMDESK__SECURITY__PEPPER`)

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use claimdesk_auth::AuthConfig;
use claimdesk_auth::config::DEFAULT_MIN_PASSWORD_LENGTH;
use claimdesk_db::DbConfig;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "claimdesk";
const ENV_PREFIX: &str = "CLAIMDESK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: usize,
    pub busy_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct SecuritySettings {
    /// Base64 of the 32-byte AES-256-GCM key for national identifiers.
    pub field_encryption_key: Option<String>,
    pub pepper: Option<String>,
    pub min_password_length: usize,
}

impl std::fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySettings")
            .field(
                "field_encryption_key",
                &self.field_encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

/// First administrator, created only while the user table is empty.
#[derive(Clone, Deserialize)]
pub struct BootstrapSettings {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_password: None,
        }
    }
}

impl std::fmt::Debug for BootstrapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSettings")
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl AppConfig {
    /// Load `.env`, then defaults, file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings = Self::with_defaults(builder, &DbConfig::default())?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        db: &DbConfig,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(builder
            .set_default("database.path", db.path.to_string_lossy().into_owned())?
            .set_default("database.max_connections", db.max_connections as u64)?
            .set_default("database.busy_timeout_secs", db.busy_timeout_secs)?
            .set_default(
                "security.min_password_length",
                DEFAULT_MIN_PASSWORD_LENGTH as u64,
            )?)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            path: self.database.path.clone(),
            max_connections: self.database.max_connections,
            busy_timeout_secs: self.database.busy_timeout_secs,
        }
    }

    /// Fails when the encryption key is missing, not 32 bytes of base64,
    /// or all zeros.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let encoded = self.security.field_encryption_key.as_deref().ok_or_else(|| {
            ConfigError::Invalid("security.field_encryption_key is required".into())
        })?;
        let bytes = BASE64.decode(encoded.trim()).map_err(|e| {
            ConfigError::Invalid(format!("field_encryption_key is not base64: {e}"))
        })?;
        let field_encryption_key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ConfigError::Invalid(format!(
                "field_encryption_key must be 32 bytes, got {}",
                b.len()
            ))
        })?;
        if field_encryption_key == [0u8; 32] {
            return Err(ConfigError::Invalid(
                "field_encryption_key must not be all zeros".into(),
            ));
        }

        Ok(AuthConfig {
            pepper: self.security.pepper.clone().filter(|p| !p.is_empty()),
            min_password_length: self.security.min_password_length,
            field_encryption_key,
        })
    }
}
