//! Authentication configuration.

use super::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable development mode (dev users, `X-Dev-User`, `dev:` tokens).
    pub dev_mode: bool,

    /// JWT secret for HS256. Accepts `env:VAR_NAME`.
    /// REQUIRED when dev_mode is false.
    pub jwt_secret: Option<String>,

    /// Lifetime of issued session tokens.
    pub token_ttl_hours: i64,

    /// Development users (only used in dev mode).
    /// Passwords are stored as bcrypt hashes.
    pub dev_users: Vec<DevUser>,

    /// Allowed CORS origins. If empty in production, CORS is disabled.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            jwt_secret: None,
            token_ttl_hours: 24,
            dev_users: Vec::new(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// Placeholder secret shipped in example configs; never valid in production.
const PLACEHOLDER_SECRET: &str = "dev-secret-change-in-production";
const MIN_SECRET_LEN: usize = 32;

impl AuthConfig {
    /// The configured secret, with `env:VAR_NAME` read from the environment.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        let Some(value) = self.jwt_secret.as_deref() else {
            return Ok(None);
        };
        let Some(var) = value.strip_prefix("env:") else {
            return Ok(Some(value.to_string()));
        };

        match std::env::var(var) {
            Ok(secret) if secret.is_empty() => Err(ConfigValidationError::EnvVarEmpty(var.into())),
            Ok(secret) => Ok(Some(secret)),
            Err(_) => Err(ConfigValidationError::EnvVarNotFound(var.into())),
        }
    }

    /// Production needs a real secret; dev mode only needs a sane TTL.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.token_ttl_hours <= 0 {
            return Err(ConfigValidationError::InvalidTokenTtl(self.token_ttl_hours));
        }
        if self.dev_mode {
            return Ok(());
        }

        match self.resolve_jwt_secret()? {
            None => Err(ConfigValidationError::MissingJwtSecret),
            Some(secret) if secret == PLACEHOLDER_SECRET => {
                Err(ConfigValidationError::InsecureJwtSecret)
            }
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                Err(ConfigValidationError::JwtSecretTooShort)
            }
            Some(_) => Ok(()),
        }
    }

    /// 64 random alphanumerics, used for ephemeral dev-mode secrets.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;
        use rand::distr::Alphanumeric;

        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error(
        "JWT secret is required when dev_mode is false. Set CARELINE__AUTH__JWT_SECRET or auth.jwt_secret in config."
    )]
    MissingJwtSecret,

    #[error("JWT secret cannot be the default insecure value outside dev mode.")]
    InsecureJwtSecret,

    #[error("JWT secret must be at least 32 characters long.")]
    JwtSecretTooShort,

    #[error("token_ttl_hours must be positive, got {0}.")]
    InvalidTokenTtl(i64),

    #[error("Environment variable '{0}' not found (referenced via env:{0} in config).")]
    EnvVarNotFound(String),

    #[error("Environment variable '{0}' is empty (referenced via env:{0} in config).")]
    EnvVarEmpty(String),
}

/// Development user configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevUser {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Password hash (bcrypt).
    pub password_hash: String,
    /// Role.
    pub role: Role,
}

impl DevUser {
    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}
