//! Runtime configuration read from the process environment.
//!
//! Everything the subsystem needs at startup is validated here, including the
//! JWT signing secret, so that a bad deployment fails before the server binds.

use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::auth::signing::SigningKey;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("JWT_SECRET must not be empty")]
    EmptySecret,

    #[error("JWT_SECRET is {len} bytes, at least {min} are required for HS256")]
    WeakSecret { len: usize, min: usize },
}

/// Credentials for the account seeded at startup.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub signing_key: SigningKey,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub store_timeout: std::time::Duration,
    /// `None` disables the background sweep of expired refresh tokens.
    pub sweep_interval: Option<std::time::Duration>,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let signing_key = SigningKey::from_secret(secret.as_bytes())?;

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let sweep_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", 3600)?;

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_USERNAME")),
        };

        Ok(Self {
            database_url,
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            signing_key,
            access_token_ttl: positive_secs(&lookup, "ACCESS_TOKEN_TTL_SECS", 15 * 60)?,
            refresh_token_ttl: positive_secs(&lookup, "REFRESH_TOKEN_TTL_SECS", 30 * 24 * 60 * 60)?,
            reset_token_ttl: positive_secs(&lookup, "RESET_TOKEN_TTL_SECS", 15 * 60)?,
            bcrypt_cost,
            store_timeout: std::time::Duration::from_millis(parse_or(
                &lookup,
                "STORE_TIMEOUT_MS",
                5000,
            )?),
            sweep_interval: (sweep_secs > 0).then(|| std::time::Duration::from_secs(sweep_secs)),
            admin,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn positive_secs<F>(lookup: &F, key: &'static str, default: i64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: i64 = parse_or(lookup, key, default)?;
    if secs <= 0 {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        });
    }
    Ok(Duration::seconds(secs))
}
