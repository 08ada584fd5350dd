//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PICKPACK_API_BASE_URL` - PickPack REST API root (default: UAT environment)
//! - `PICKPACK_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `PICKPACK_STORAGE_DIR` - Directory for the persistent storage tier (default: .pickpack)
//! - `DIRECTPAY_ENVIRONMENT` - `sandbox` or `production` (default: sandbox)
//! - `DIRECTPAY_MERCHANT_ID` - DirectPay merchant ID (default: sandbox merchant)
//! - `DIRECTPAY_SECRET_KEY` - DirectPay HMAC signing key (checkout disabled when unset)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Default PickPack API root (UAT).
pub const DEFAULT_API_BASE_URL: &str = "https://pickpackuat.openskylabz.com/api";

/// Default DirectPay sandbox merchant.
pub const SANDBOX_MERCHANT_ID: &str = "LA13502";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
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
    /// REST API configuration
    pub api: ApiConfig,
    /// Directory for the persistent storage tier
    pub storage_dir: PathBuf,
    /// DirectPay payment gateway configuration
    pub directpay: DirectPayConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// PickPack REST API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API root, without trailing slash (e.g. `https://host/api`)
    pub base_url: String,
    /// Per-request timeout enforced by the HTTP client
    pub timeout: Duration,
}

impl ApiConfig {
    /// Configuration pointing at `base_url` with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

/// DirectPay deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectPayEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl DirectPayEnvironment {
    /// Stage string expected by the DirectPay checkout widget.
    #[must_use]
    pub const fn stage(self) -> &'static str {
        match self {
            Self::Sandbox => "DEV",
            Self::Production => "PROD",
        }
    }

    /// Merchant portal for this environment.
    #[must_use]
    pub const fn portal_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://dpmp.directpay.lk/",
            Self::Production => "https://portal.directpay.lk/",
        }
    }
}

impl std::str::FromStr for DirectPayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "dev" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected sandbox or production, got '{other}'")),
        }
    }
}

/// DirectPay payment gateway configuration.
///
/// Implements `Debug` manually to redact the signing key.
#[derive(Clone)]
pub struct DirectPayConfig {
    /// Sandbox or production
    pub environment: DirectPayEnvironment,
    /// Merchant ID issued by DirectPay
    pub merchant_id: String,
    /// HMAC-SHA256 signing key; checkout is unavailable without it
    pub secret_key: Option<SecretString>,
}

impl std::fmt::Debug for DirectPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectPayConfig")
            .field("environment", &self.environment)
            .field("merchant_id", &self.merchant_id)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for DirectPayConfig {
    fn default() -> Self {
        Self {
            environment: DirectPayEnvironment::Sandbox,
            merchant_id: SANDBOX_MERCHANT_ID.to_string(),
            secret_key: None,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or the DirectPay key
    /// fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_env_or_default("PICKPACK_API_BASE_URL", DEFAULT_API_BASE_URL);
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PICKPACK_API_BASE_URL".to_string(), e.to_string())
        })?;
        let timeout_secs = get_env_or_default(
            "PICKPACK_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("PICKPACK_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let api = ApiConfig {
            timeout: Duration::from_secs(timeout_secs),
            ..ApiConfig::new(base_url)
        };
        let storage_dir = PathBuf::from(get_env_or_default("PICKPACK_STORAGE_DIR", ".pickpack"));
        let directpay = DirectPayConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api,
            storage_dir,
            directpay,
            sentry_dsn,
        })
    }
}

impl DirectPayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let environment = get_env_or_default("DIRECTPAY_ENVIRONMENT", "sandbox")
            .parse::<DirectPayEnvironment>()
            .map_err(|e| ConfigError::InvalidEnvVar("DIRECTPAY_ENVIRONMENT".to_string(), e))?;
        let merchant_id = get_env_or_default("DIRECTPAY_MERCHANT_ID", SANDBOX_MERCHANT_ID);
        let secret_key = get_optional_env("DIRECTPAY_SECRET_KEY")
            .map(|value| {
                validate_secret_strength(&value, "DIRECTPAY_SECRET_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        if environment == DirectPayEnvironment::Production && secret_key.is_none() {
            return Err(ConfigError::MissingEnvVar("DIRECTPAY_SECRET_KEY".to_string()));
        }

        Ok(Self {
            environment,
            merchant_id,
            secret_key,
        })
    }

    /// Expose the signing key, if configured.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret_key.as_ref().map(|key| key.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
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
    let len = s.len() as f64;
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Hex-encoded keys top out at 4 bits/char
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
