use std::env;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/messagely.db?mode=rwc";
const TEST_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_SECRET_KEY: &str = "secret";

pub const BCRYPT_WORK_FACTOR: u32 = 12;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

// bcrypt rejects costs outside this range
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process-wide settings, built once at startup and shared through the router state.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub bcrypt_cost: u32,
    pub token_ttl: i64,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let testing = lookup("APP_ENV").is_some_and(|v| v == "test");
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            if testing {
                TEST_DATABASE_URL.into()
            } else {
                DEFAULT_DATABASE_URL.into()
            }
        });

        let secret_key = match lookup("SECRET_KEY") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("SECRET_KEY not set, falling back to the development secret");
                DEFAULT_SECRET_KEY.into()
            }
        };

        let bcrypt_cost = parse_var(&lookup, "BCRYPT_WORK_FACTOR", BCRYPT_WORK_FACTOR)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_WORK_FACTOR",
                value: bcrypt_cost.to_string(),
            });
        }

        let token_ttl = parse_var(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl) {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECS",
                value: token_ttl.to_string(),
            });
        }

        Ok(Self {
            database_url,
            secret_key,
            bcrypt_cost,
            token_ttl,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&lookup, "PORT", 3000)?,
        })
    }

    /// In-memory database, cheapest bcrypt cost. Used by the test suites.
    pub fn for_tests() -> Self {
        Self {
            database_url: TEST_DATABASE_URL.into(),
            secret_key: "test-secret".into(),
            bcrypt_cost: MIN_BCRYPT_COST,
            token_ttl: DEFAULT_TOKEN_TTL_SECS,
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
