//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 120;
const DEFAULT_BCRYPT_COST: u32 = 10;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `DB_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `REQUEST_TIMEOUT_MS`: fulfillment transaction deadline (default: `5000`)
/// - `SECRET_KEY`: HS256 signing secret; unset means an ephemeral per-process key
/// - `TOKEN_TTL_MINUTES`: access token lifetime (default: `120`)
/// - `BCRYPT_COST`: password hashing work factor, 4 to 31 (default: `10`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub request_timeout: Duration,
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, "PORT").unwrap_or(DEFAULT_PORT),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            db_max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            request_timeout: Duration::from_millis(
                parse_var(&lookup, "REQUEST_TIMEOUT_MS")
                    .filter(|ms: &u64| *ms > 0)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            jwt_secret: lookup("SECRET_KEY").filter(|secret| !secret.is_empty()),
            token_ttl: Duration::from_secs(
                60 * parse_var(&lookup, "TOKEN_TTL_MINUTES")
                    .filter(|m: &u64| (1..=60 * 24 * 365).contains(m))
                    .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES),
            ),
            bcrypt_cost: parse_var(&lookup, "BCRYPT_COST")
                .filter(|c: &u32| (4..=31).contains(c))
                .unwrap_or(DEFAULT_BCRYPT_COST),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request timeout in whole milliseconds, saturating at `u64::MAX`.
    pub fn request_timeout_ms(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("request_timeout", &self.request_timeout)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
