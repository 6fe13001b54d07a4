use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::Credentials;
use crate::server::AppState;
use crate::server::dto::{LoginRequest, TokenResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::store;

/// Exchanges a user name and password for a user token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let LoginRequest { name, password } = req;

    let user = store::blocking(&state.store, move |s| {
        let Some(user) = s.get_user_by_name(&name)? else {
            return Ok(None);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };
        let matches = Credentials::new().verify(&password, hash)?;
        Ok((matches && user.active).then_some(user))
    })
    .await?
    .ok_or_else(|| {
        tracing::debug!("Rejected login attempt");
        ApiError::unauthorized("Invalid credentials")
    })?;

    let token = state.tokens.sign_user_token(&user.id, user.role)?;
    tracing::info!("User {} logged in", user.name);

    Ok(Json(ApiResponse::success(TokenResponse {
        token,
        expires_in: state.tokens.ttl().as_secs(),
    })))
}
