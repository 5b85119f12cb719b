use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Minimum HMAC-SHA256 key size in bytes (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Default bound on the credential-store lookup performed by the gate.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;

/// Frontend origin allowed by CORS when none is configured.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Authentication configuration, built once at startup and never mutated.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Process-wide secret the token signing key is derived from
    pub jwt_secret: String,
    /// Upper bound for resolving a token subject against the user store
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Reject secrets that cannot back an HS256 key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let actual = self.jwt_secret.len();
        if actual < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                actual,
                required: MIN_SECRET_BYTES,
            });
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

// The secret must never reach a log line.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("lookup_timeout_ms", &self.lookup_timeout_ms)
            .finish()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

/// Configuration errors raised at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No signing secret was provided
    MissingSecret,
    /// The signing secret is shorter than an HS256 key
    SecretTooShort { actual: usize, required: usize },
    /// Lookup timeout of zero would reject every request
    InvalidTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "JWT secret is not configured (set TECHBLOG_JWT_SECRET)"),
            Self::SecretTooShort { actual, required } => write!(
                f,
                "JWT secret is {} bytes, at least {} bytes are required",
                actual, required
            ),
            Self::InvalidTimeout => write!(f, "Lookup timeout must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}
