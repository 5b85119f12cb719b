// HTTP error mapping for the REST API

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::auth::AuthzError;

/// Every failure a handler can return.
#[derive(Debug)]
pub enum ApiError {
    /// Route requires a caller and the request is anonymous
    Unauthenticated,
    /// Login with an unknown email or a wrong password
    InvalidCredentials,
    /// Caller is authenticated but does not own the resource
    Forbidden,
    NotFound { resource: &'static str, id: String },
    BadRequest(String),
    /// Server-side fault; the detail is logged, never returned
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn user_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::InvalidCredentials => write!(f, "Invalid email or password"),
            Self::Forbidden => write!(f, "You can only modify your own content"),
            Self::NotFound { resource, id } => write!(f, "{} with ID {} not found", resource, id),
            Self::BadRequest(msg) => write!(f, "{}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => Self::Unauthenticated,
            AuthzError::NotOwner => Self::Forbidden,
            AuthzError::NoOwner => Self::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(_) => tracing::error!("Internal service error: {}", self),
            Self::Unauthenticated | Self::InvalidCredentials | Self::Forbidden => {
                tracing::info!("Authorization error: {}", self)
            }
            Self::NotFound { .. } | Self::BadRequest(_) => tracing::debug!("Client error: {}", self),
        }

        let body = json!({ "error": self.user_message() });
        (self.status_code(), Json(body)).into_response()
    }
}
