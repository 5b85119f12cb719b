// Login endpoint

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AppState, error::ApiError};
use crate::types::PrincipalHandle;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Exchange an email and password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(user) = state
        .users
        .verify_credentials(&payload.email, &payload.password)
        .await?
    else {
        debug!(email = %payload.email, "Login rejected");
        return Err(ApiError::InvalidCredentials);
    };

    let issued = state.tokens.issue(&PrincipalHandle::new(user.email))?;
    info!(email = %payload.email, expires_at = %issued.expires_at, "Login succeeded");

    Ok(Json(LoginResponse { token: issued.token }))
}
