//! Error taxonomy for the auth endpoints and the gate.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::credentials::VerifyError;
use super::token::{RefreshError, SigningError};

/// Every failure an auth handler can report to a client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid username or password")]
    Authentication,
    #[error("Not logged")]
    SessionAbsent,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token is not expired yet")]
    TooEarly,
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::TooEarly => StatusCode::BAD_REQUEST,
            Self::Authentication | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::SessionAbsent => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidCredentials => Self::Authentication,
            VerifyError::Store(inner) => Self::Internal(inner),
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::InvalidSignature => Self::InvalidToken,
            RefreshError::TooEarly => Self::TooEarly,
            RefreshError::Signing(inner) => Self::from(inner),
        }
    }
}

impl From<SigningError> for AuthError {
    fn from(err: SigningError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // The gate reply keeps the `message` key clients already match on.
            Self::SessionAbsent => json!({ "message": self.to_string() }),
            Self::Internal(cause) => {
                error!("Internal auth error: {cause:#}");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
