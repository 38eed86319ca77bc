use std::{env, str::FromStr};
use thiserror::Error;

/// Fallback signing secret for `Env::Local` only. Production refuses to start without
/// an explicit `JWT_SECRET`.
const LOCAL_JWT_SECRET: &str = "post-board-local-development-secret";

/// Lowest and highest work factors bcrypt accepts.
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// AppConfig
///
/// Holds the application's entire configuration. Immutable once loaded and pulled into
/// handlers and extractors via `FromRef<AppState>`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls secret fallbacks and the log format.
    pub env: Env,
    // Postgres connection string. `None` runs against the in-memory store (local only).
    pub database_url: Option<String>,
    pub bind_addr: String,
    // HS256 key shared by the token issuer and verifier.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    // Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: i64,
    // When false, `exp` is still issued but not checked on verification.
    pub jwt_validate_exp: bool,
    pub bcrypt_cost: u32,
    // Initial admin account created on an empty user table.
    pub admin_seed: Option<AdminSeed>,
}

#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub name: String,
    pub password: String,
}

/// Env
///
/// Defines the runtime context.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingInProduction(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests. Uses the in-memory store and the minimum
    /// bcrypt cost so hashing stays fast.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            jwt_issuer: "post-board".to_string(),
            token_ttl_secs: 3600,
            jwt_validate_exp: true,
            bcrypt_cost: MIN_BCRYPT_COST,
            admin_seed: None,
        }
    }
}

/// Reads `name`, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. In production the database URL
    /// and the JWT secret are mandatory, so a misconfigured deployment fails at startup
    /// rather than signing tokens with a known key.
    pub fn load() -> Result<Self, ConfigError> {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if env == Env::Production && database_url.is_none() {
            return Err(ConfigError::MissingInProduction("DATABASE_URL"));
        }

        let jwt_secret = match (env, env::var("JWT_SECRET").ok().filter(|s| !s.is_empty())) {
            (_, Some(secret)) => secret,
            (Env::Production, None) => return Err(ConfigError::MissingInProduction("JWT_SECRET")),
            (Env::Local, None) => LOCAL_JWT_SECRET.to_string(),
        };

        let token_ttl_secs: i64 = parse_var("TOKEN_TTL_SECS", 3600)?;
        if token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECS",
                value: token_ttl_secs.to_string(),
            });
        }

        let bcrypt_cost: u32 = parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let admin_seed = env::var("ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .map(|password| AdminSeed {
                username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "adminuser".to_string()),
                name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
                password,
            });

        Ok(Self {
            env,
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "post-board".to_string()),
            token_ttl_secs,
            jwt_validate_exp: parse_var("JWT_VALIDATE_EXP", true)?,
            bcrypt_cost,
            admin_seed,
        })
    }
}
