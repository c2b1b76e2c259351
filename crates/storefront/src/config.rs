//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RIGSHOP_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `RIGSHOP_DATABASE_URL` (or `DATABASE_URL`) - only when `RIGSHOP_STORAGE=postgres`
//!
//! ## Optional
//! - `RIGSHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `RIGSHOP_PORT` - Listen port (default: 3000)
//! - `RIGSHOP_STORAGE` - `json` or `postgres` (default: json)
//! - `RIGSHOP_DATA_DIR` - Directory of the JSON store (default: database)
//! - `RIGSHOP_TOKEN_TTL_HOURS` - Token lifetime (default: 168)
//! - `RIGSHOP_IMAGE_DIR` - Where uploaded product images live (default: public/images)
//! - `RIGSHOP_MAX_UPLOAD_BYTES` - Upload size limit (default: 5 MiB)
//! - `RIGSHOP_ALLOWED_ORIGINS` - Comma separated CORS origins (default: none)
//! - `RIGSHOP_AUTH_RATE_PERIOD_SECS` - Seconds to replenish one auth request (default: 6)
//! - `RIGSHOP_AUTH_RATE_BURST` - Auth request burst size (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where products, users, orders and carts are persisted.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// One JSON file per collection inside `data_dir`.
    Json { data_dir: PathBuf },
    /// A `PostgreSQL` database.
    Postgres { database_url: SecretString },
}

/// Token bucket for the auth endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request.
    pub period_secs: u64,
    /// Requests allowed back to back.
    pub burst: u32,
}

/// Sentry client settings.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Storage backend
    pub storage: StorageConfig,
    /// HS256 signing secret for bearer tokens
    pub jwt_secret: SecretString,
    /// Bearer token lifetime in hours
    pub token_ttl_hours: i64,
    /// Directory uploaded images are written to and served from
    pub image_dir: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// Origins allowed by CORS; empty disables the CORS layer
    pub allowed_origins: Vec<String>,
    /// Rate limit applied to login and registration
    pub auth_rate_limit: RateLimitConfig,
    /// Error tracking
    pub sentry: SentryConfig,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| vars.get(key).cloned())
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = parse_env::<IpAddr>(env, "RIGSHOP_HOST", "127.0.0.1")?;
        let port = parse_env::<u16>(env, "RIGSHOP_PORT", "3000")?;
        let storage = StorageConfig::from_lookup(env)?;

        let jwt_secret = get_validated_secret(env, "RIGSHOP_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "RIGSHOP_JWT_SECRET")?;

        let token_ttl_hours = parse_env::<i64>(env, "RIGSHOP_TOKEN_TTL_HOURS", "168")?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "RIGSHOP_TOKEN_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let image_dir = PathBuf::from(get_env_or_default(env, "RIGSHOP_IMAGE_DIR", "public/images"));
        let max_upload_bytes = parse_env::<usize>(env, "RIGSHOP_MAX_UPLOAD_BYTES", "5242880")?;

        let allowed_origins: Vec<String> = get_optional_env(env, "RIGSHOP_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let auth_rate_limit = RateLimitConfig {
            period_secs: parse_env(env, "RIGSHOP_AUTH_RATE_PERIOD_SECS", "6")?,
            burst: parse_env(env, "RIGSHOP_AUTH_RATE_BURST", "5")?,
        };
        if auth_rate_limit.period_secs == 0 || auth_rate_limit.burst == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "RIGSHOP_AUTH_RATE_PERIOD_SECS/RIGSHOP_AUTH_RATE_BURST".to_string(),
                "must be positive".to_string(),
            ));
        }

        let sentry = SentryConfig {
            dsn: get_optional_env(env, "SENTRY_DSN"),
            environment: get_optional_env(env, "SENTRY_ENVIRONMENT"),
            sample_rate: parse_env(env, "SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env(env, "SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        };

        Ok(Self {
            host,
            port,
            storage,
            jwt_secret,
            token_ttl_hours,
            image_dir,
            max_upload_bytes,
            allowed_origins,
            auth_rate_limit,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StorageConfig {
    /// Read the storage section on its own (the CLI needs nothing else).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown backend or a missing database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        match get_env_or_default(env, "RIGSHOP_STORAGE", "json").as_str() {
            "json" => Ok(Self::Json {
                data_dir: PathBuf::from(get_env_or_default(env, "RIGSHOP_DATA_DIR", "database")),
            }),
            "postgres" => Ok(Self::Postgres {
                database_url: get_database_url(env, "RIGSHOP_DATABASE_URL")?,
            }),
            other => Err(ConfigError::InvalidEnvVar(
                "RIGSHOP_STORAGE".to_string(),
                format!("expected `json` or `postgres`, got `{other}`"),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(env: Lookup<'_>, primary_key: &str) -> Result<SecretString, ConfigError> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(env: Lookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: Lookup<'_>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(env: Lookup<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(env: Lookup<'_>, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(env, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-jwt-secret-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(GOOD_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from(GOOD_SECRET), "TEST").is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::from_vars(&vars(&[("RIGSHOP_JWT_SECRET", GOOD_SECRET)])).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(matches!(
            config.storage,
            StorageConfig::Json { ref data_dir } if data_dir == &PathBuf::from("database")
        ));
        assert_eq!(config.token_ttl_hours, 168);
        assert_eq!(config.image_dir, PathBuf::from("public/images"));
        assert_eq!(config.max_upload_bytes, 5_242_880);
        assert!(config.allowed_origins.is_empty());
        assert_eq!(
            config.auth_rate_limit,
            RateLimitConfig {
                period_secs: 6,
                burst: 5
            }
        );
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_missing_jwt_secret() {
        let err = StorefrontConfig::from_vars(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "RIGSHOP_JWT_SECRET"));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_STORAGE", "postgres"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));

        let config = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_STORAGE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/rigshop"),
        ]))
        .unwrap();
        assert!(matches!(config.storage, StorageConfig::Postgres { .. }));
    }

    #[test]
    fn test_unknown_storage_backend() {
        let err = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_STORAGE", "sqlite"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "RIGSHOP_STORAGE"));
    }

    #[test]
    fn test_invalid_port() {
        let err = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "RIGSHOP_PORT"));
    }

    #[test]
    fn test_allowed_origins_are_split() {
        let config = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_ALLOWED_ORIGINS", "https://a.example.org, ,https://b.example.org"),
        ]))
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example.org", "https://b.example.org"]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = StorefrontConfig::from_vars(&vars(&[
            ("RIGSHOP_JWT_SECRET", GOOD_SECRET),
            ("RIGSHOP_STORAGE", "postgres"),
            ("RIGSHOP_DATABASE_URL", "postgres://rigshop:hunter22@db/rigshop"),
        ]))
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains(GOOD_SECRET));
        assert!(!debug_output.contains("hunter22"));
    }
}
