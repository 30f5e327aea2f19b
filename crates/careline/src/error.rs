//! Domain error taxonomy shared by the membership, intake and consultation
//! services.

use sqlx::error::DatabaseError;
use thiserror::Error;

use crate::onboarding::{Destination, OnboardingStep};

/// Result type for domain operations.
pub type CareResult<T> = Result<T, CareError>;

/// Errors surfaced by domain services to the requesting handler.
///
/// None of these are retried automatically.
#[derive(Debug, Error)]
pub enum CareError {
    /// The caller does not own the referenced membership, person or
    /// consultation.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A stage was loaded or submitted before its prerequisite step was
    /// reached. Carries the canonical destination for the current step.
    #[error("{stage} is not available at step {current}")]
    OutOfSequence {
        stage: String,
        current: String,
        redirect: Destination,
    },

    /// A submitted field is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule refused the operation; nothing was changed.
    #[error("{0}")]
    Rejected(String),

    /// A database write or read failed. The caller should retry.
    #[error("storage error: {0}")]
    Persistence(String),
}

impl CareError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Build an out-of-sequence error for a stage attempted at `current`.
    pub fn out_of_sequence(
        stage: impl std::fmt::Display,
        current: Option<OnboardingStep>,
        redirect: Destination,
    ) -> Self {
        Self::OutOfSequence {
            stage: stage.to_string(),
            current: current
                .map(|s| s.to_string())
                .unwrap_or_else(|| "no membership".to_string()),
            redirect,
        }
    }
}

impl CareError {
    /// A storage failure, reported as `Rejected(msg)` when a unique
    /// constraint refused the write.
    pub fn on_unique_violation(err: anyhow::Error, msg: impl Into<String>) -> Self {
        match database_error(&err) {
            Some(db) if db.is_unique_violation() => Self::rejected(msg),
            _ => err.into(),
        }
    }

    /// A storage failure, reported as `Rejected(msg)` when a foreign key
    /// still references the row.
    pub fn on_foreign_key_violation(err: anyhow::Error, msg: impl Into<String>) -> Self {
        match database_error(&err) {
            Some(db) if db.is_foreign_key_violation() => Self::rejected(msg),
            _ => err.into(),
        }
    }
}

fn database_error(err: &anyhow::Error) -> Option<&(dyn DatabaseError + 'static)> {
    err.downcast_ref::<sqlx::Error>()?.as_database_error()
}

impl From<sqlx::Error> for CareError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<anyhow::Error> for CareError {
    fn from(err: anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for CareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("encoding stored value: {err}"))
    }
}
