//! HTTP error responses.
//!
//! Every failure leaves a handler as `{ "error", "code" }` JSON. Sequence
//! violations also carry `redirect_to` and a `Location` header.

use axum::{
    Json,
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::AuthError;
use crate::error::CareError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// The caller asked for a page other than its current one.
    #[error("{message}")]
    SeeOther {
        location: &'static str,
        message: String,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
            Self::SeeOther { .. } => (StatusCode::SEE_OTHER, "OUT_OF_SEQUENCE"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        self.parts().0
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        match &self {
            Self::Internal(msg) => error!(code, message = %msg, "request failed"),
            Self::Unavailable(msg) => warn!(code, message = %msg, "storage unavailable"),
            other => debug!(code, message = %other, "request rejected"),
        }

        let redirect_to = match &self {
            Self::SeeOther { location, .. } => Some(*location),
            _ => None,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code,
            redirect_to,
        });

        match redirect_to {
            Some(location) => (status, [(LOCATION, location)], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}

impl From<CareError> for ApiError {
    fn from(err: CareError) -> Self {
        match err {
            // The caller is authenticated here, just not the owner.
            CareError::Unauthorized(msg) => Self::Forbidden(msg),
            CareError::NotFound(what) => Self::NotFound(what),
            CareError::OutOfSequence {
                stage,
                current,
                redirect,
            } => Self::SeeOther {
                location: redirect.path(),
                message: format!("{stage} is not available at step {current}"),
            },
            CareError::Validation(msg) => Self::Validation(msg),
            CareError::Rejected(msg) => Self::Conflict(msg),
            CareError::Persistence(msg) => Self::Unavailable(msg),
        }
    }
}

/// Untyped failures from the user store surface as storage errors.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(db) => Self::Unavailable(db.to_string()),
            Err(err) => Self::Internal(format!("{err:#}")),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            err @ AuthError::MissingCapability(_) => Self::Forbidden(err.to_string()),
            AuthError::Internal(msg) => Self::Internal(msg),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
