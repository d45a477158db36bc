//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `ARCADE_API_URL` - Commerce backend base URL (default: `http://localhost:8081`)
//! - `ARCADE_STATE_DIR` - Directory holding the persisted session (default: `.arcade`)
//! - `ARCADE_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `ARCADE_IDLE_MINUTES` - Inactivity window before a forced sign-out (default: 30)
//! - `ARCADE_FUNCTIONS_URL` - Serverless functions base URL
//! - `ARCADE_FUNCTIONS_TOKEN` - Bearer token for the serverless functions
//!   (required when `ARCADE_FUNCTIONS_URL` is set)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8081";
const DEFAULT_STATE_DIR: &str = ".arcade";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_MINUTES: u64 = 30;

/// How long a persisted session stays valid.
pub const SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
/// How often a live session is re-validated against the backend.
pub const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Pause between a successful checkout and the hand-off to the library.
pub const CHECKOUT_REDIRECT_DELAY: Duration = Duration::from_secs(1);

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "put-your",
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

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce backend base URL
    pub api_url: Url,
    /// Directory holding the persisted session snapshot
    pub state_dir: PathBuf,
    /// Per-request timeout for backend calls
    pub request_timeout: Duration,
    /// Session expiry and monitoring
    pub session: SessionConfig,
    /// Delay between checkout success and the library hand-off
    pub checkout_redirect_delay: Duration,
    /// Serverless functions (alternate checkout/sync path)
    pub functions: Option<FunctionsConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Session expiry and monitoring windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Age after which a persisted session is discarded
    pub lifetime: Duration,
    /// Inactivity window before a forced sign-out
    pub idle_timeout: Duration,
    /// Interval between background session validations
    pub check_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: SESSION_LIFETIME,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_MINUTES * 60),
            check_interval: SESSION_CHECK_INTERVAL,
        }
    }
}

/// Serverless functions configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct FunctionsConfig {
    /// Base URL the function names are appended to
    pub url: Url,
    /// Bearer token issued by the functions' own auth service
    pub token: SecretString,
}

impl std::fmt::Debug for FunctionsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionsConfig")
            .field("url", &self.url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Configuration with defaults for everything but the backend URL and
    /// state directory.
    #[must_use]
    pub fn new(api_url: Url, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: with_trailing_slash(api_url),
            state_dir: state_dir.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session: SessionConfig::default(),
            checkout_redirect_delay: CHECKOUT_REDIRECT_DELAY,
            functions: None,
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, or if the functions
    /// URL is set without a strong token.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_url("ARCADE_API_URL", &get_env_or_default("ARCADE_API_URL", DEFAULT_API_URL))?;
        let state_dir = PathBuf::from(get_env_or_default("ARCADE_STATE_DIR", DEFAULT_STATE_DIR));
        let request_timeout = Duration::from_secs(get_u64_or_default(
            "ARCADE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let idle_minutes = get_u64_or_default("ARCADE_IDLE_MINUTES", DEFAULT_IDLE_MINUTES)?;
        if idle_minutes == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ARCADE_IDLE_MINUTES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let session = SessionConfig {
            idle_timeout: Duration::from_secs(idle_minutes * 60),
            ..SessionConfig::default()
        };

        Ok(Self {
            api_url,
            state_dir,
            request_timeout,
            session,
            checkout_redirect_delay: CHECKOUT_REDIRECT_DELAY,
            functions: FunctionsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }
}

impl FunctionsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(url) = get_optional_env("ARCADE_FUNCTIONS_URL") else {
            return Ok(None);
        };
        Ok(Some(Self {
            url: parse_url("ARCADE_FUNCTIONS_URL", &url)?,
            token: get_validated_secret("ARCADE_FUNCTIONS_TOKEN")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable; blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn get_u64_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |v| {
        v.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse an http(s) base URL.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(with_trailing_slash(url))
}

/// Make sure relative joins keep the URL's last path segment.
#[must_use]
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
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

/// Validate that a token is not a placeholder and has sufficient entropy.
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
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
