use chrono::Duration;
use std::{env, fmt::Display, str::FromStr};
use thiserror::Error;
use tracing::{info, warn};

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/tickets";
const DEFAULT_PORT: &str = "3001";
const DEFAULT_MAX_CONNECTIONS: &str = "5";
const DEFAULT_SESSION_TTL_HOURS: &str = "168";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("{0} must be set together with ADMIN_USERNAME and ADMIN_PASSWORD")]
    IncompleteAdmin(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

/// Account created on startup when the users table is empty.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub port: u16,
    pub database_max_connections: u32,
    pub session_ttl: Duration,
    /// `RUST_ENV=production`: HSTS and `Secure` cookies.
    pub production: bool,
    pub cors_allowed_origins: Vec<String>,
    pub admin: Option<AdminBootstrap>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            storage_backend: StorageBackend::Postgres,
            port: 3001,
            database_max_connections: 5,
            session_ttl: Duration::hours(168),
            production: false,
            cors_allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            admin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so parsing can be exercised
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_ttl_hours: i64 =
            try_load(&lookup, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                message: "must be positive".to_string(),
            });
        }

        let production = lookup("RUST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| {
                info!("DATABASE_URL not set, using default: {DEFAULT_DATABASE_URL}");
                DEFAULT_DATABASE_URL.to_string()
            }),
            storage_backend: try_load(&lookup, "STORAGE_BACKEND", "postgres")?,
            port: try_load(&lookup, "PORT", DEFAULT_PORT)?,
            database_max_connections: try_load(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            session_ttl: Duration::hours(session_ttl_hours),
            production,
            cors_allowed_origins: split_origins(&origins),
            admin: load_admin(&lookup)?,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            message: e.to_string(),
        }
    })
}

fn load_admin<F>(lookup: &F) -> Result<Option<AdminBootstrap>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    match (
        value("ADMIN_USERNAME"),
        value("ADMIN_EMAIL"),
        value("ADMIN_PASSWORD"),
    ) {
        (Some(username), Some(email), Some(password)) => Ok(Some(AdminBootstrap {
            username,
            email,
            password,
        })),
        (None, None, None) => Ok(None),
        (_, None, _) => Err(ConfigError::IncompleteAdmin("ADMIN_EMAIL")),
        (None, _, _) => Err(ConfigError::IncompleteAdmin("ADMIN_USERNAME")),
        (_, _, None) => Err(ConfigError::IncompleteAdmin("ADMIN_PASSWORD")),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
