//! Ledger configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STRIPE_WEBHOOK_SECRET` - Shared secret used to verify webhook signatures
//! - `LEDGER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string,
//!   unless `LEDGER_STORAGE=memory`
//!
//! ## Optional
//! - `LEDGER_STORAGE` - `postgres` (default) or `memory`
//! - `LEDGER_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` / `LEDGER_PORT` - Listen port (default: 4242)
//! - `LEDGER_DEFAULT_PLAN` - Plan credited for missing/unknown plan ids (default: pro)
//! - `WEBHOOK_TOLERANCE_SECS` - Signature timestamp tolerance (default: 300)
//! - `LEDGER_API_TOKEN` - Bearer token enabling the `/api` account routes
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `text` (default) or `json`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use droxion_core::Plan;

const MIN_API_TOKEN_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Where account state is kept.
#[derive(Clone)]
pub enum StorageConfig {
    /// `PostgreSQL` at the given URL (contains password).
    Postgres { database_url: SecretString },
    /// Process memory; balances are lost on restart.
    Memory,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Ledger service configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct LedgerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Account storage backend
    pub storage: StorageConfig,
    /// Webhook signing secret shared with the payment provider
    pub webhook_secret: SecretString,
    /// Allowed distance between a signature's timestamp and now
    pub signature_tolerance: Duration,
    /// Plan credited when a purchase names no plan or an unknown one
    pub default_plan: Plan,
    /// Bearer token for the `/api` routes; the routes are disabled when unset
    pub api_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage", &self.storage)
            .field("webhook_secret", &"[REDACTED]")
            .field("signature_tolerance", &self.signature_tolerance)
            .field("default_plan", &self.default_plan)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl LedgerConfig {
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

        let host = get_env_or_default("LEDGER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LEDGER_HOST".to_string(), e.to_string()))?;

        let (port_key, port_raw) = get_optional_env("PORT")
            .map(|v| ("PORT", v))
            .or_else(|| get_optional_env("LEDGER_PORT").map(|v| ("LEDGER_PORT", v)))
            .unwrap_or(("LEDGER_PORT", "4242".to_string()));
        let port = port_raw
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar(port_key.to_string(), e.to_string()))?;

        let storage = match get_env_or_default("LEDGER_STORAGE", "postgres")
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StorageConfig::Postgres {
                database_url: get_database_url("LEDGER_DATABASE_URL")?,
            },
            "memory" => StorageConfig::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LEDGER_STORAGE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };

        let webhook_secret = get_validated_secret("STRIPE_WEBHOOK_SECRET")?;

        let signature_tolerance = get_env_or_default("WEBHOOK_TOLERANCE_SECS", "300")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("WEBHOOK_TOLERANCE_SECS".to_string(), e.to_string())
            })?;

        let default_plan = parse_default_plan(&get_env_or_default("LEDGER_DEFAULT_PLAN", "pro"))?;

        let api_token = match get_optional_env("LEDGER_API_TOKEN") {
            Some(value) => {
                validate_api_token(&value, "LEDGER_API_TOKEN")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        let log_format = match get_env_or_default("LOG_FORMAT", "text")
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'text' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            host,
            port,
            storage,
            webhook_secret,
            signature_tolerance,
            default_plan,
            api_token,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }

    /// Configuration for an in-memory ledger with defaults everywhere else.
    ///
    /// Intended for tests and local tooling.
    #[must_use]
    pub fn in_memory(webhook_secret: SecretString) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 4242,
            storage: StorageConfig::Memory,
            webhook_secret,
            signature_tolerance: Duration::from_secs(300),
            default_plan: Plan::Pro,
            api_token: None,
            sentry_dsn: None,
            sentry_environment: None,
            log_format: LogFormat::Text,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the fallback plan; it must be a purchasable tier.
fn parse_default_plan(value: &str) -> Result<Plan, ConfigError> {
    let plan = value
        .parse::<Plan>()
        .map_err(|e| ConfigError::InvalidEnvVar("LEDGER_DEFAULT_PLAN".to_string(), e.to_string()))?;
    if plan == Plan::None {
        return Err(ConfigError::InvalidEnvVar(
            "LEDGER_DEFAULT_PLAN".to_string(),
            "must be starter, pro, or business".to_string(),
        ));
    }
    Ok(plan)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Validate that an API token is long and random enough.
fn validate_api_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_API_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_API_TOKEN_LENGTH,
                token.len()
            ),
        ));
    }
    validate_secret_strength(token, var_name)
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
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
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Compare a presented bearer token with the configured one in constant time.
#[must_use]
pub fn token_matches(expected: &SecretString, presented: &str) -> bool {
    crate::webhook::signature::constant_time_compare(expected.expose_secret(), presented)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("whsec_your-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_provider_style_secret() {
        let result = validate_secret_strength("whsec_4f9Kq2LmZx8RtB1nVc7YpW3sDj6H", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_api_token_too_short() {
        assert!(validate_api_token("aB3$xY9!", "TEST_TOKEN").is_err());
    }

    #[test]
    fn test_validate_api_token_valid() {
        assert!(validate_api_token("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%", "TEST_TOKEN").is_ok());
    }

    #[test]
    fn test_parse_default_plan() {
        assert_eq!(parse_default_plan("Business").unwrap(), Plan::Business);
        assert!(parse_default_plan("none").is_err());
        assert!(parse_default_plan("enterprise").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = LedgerConfig::in_memory(SecretString::from("whsec_test"));
        config.port = 8080;
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_token_matches() {
        let token = SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%");
        assert!(token_matches(&token, "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"));
        assert!(!token_matches(&token, "nope"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = LedgerConfig::in_memory(SecretString::from("whsec_super_private"));
        config.api_token = Some(SecretString::from("api_token_super_private"));
        config.storage = StorageConfig::Postgres {
            database_url: SecretString::from("postgres://user:hunter2@db/ledger"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("whsec_super_private"));
        assert!(!debug_output.contains("api_token_super_private"));
        assert!(!debug_output.contains("hunter2"));
    }
}
