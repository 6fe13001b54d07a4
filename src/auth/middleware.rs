use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::extract_token;
use super::token::VerifiedToken;
use crate::error::Error;
use crate::server::AppState;
use crate::store;
use crate::types::{Principal, Role, User};

/// Extractor that requires any valid authentication
pub struct RequireAuth(pub Principal);

/// Extractor that requires a user token (not an application token)
pub struct RequireUser(pub User);

/// Extractor that requires a user with at least the admin role
pub struct RequireAdmin(pub User);

/// Extractor that requires the root user
pub struct RequireRoot(pub User);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidToken(Error),
    InactiveUser,
    NotUser,
    InsufficientRole(Role),
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required".to_string()),
            AuthError::InvalidToken(Error::TokenExpired) => {
                (StatusCode::UNAUTHORIZED, "Token expired".to_string())
            }
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            AuthError::InactiveUser => {
                (StatusCode::UNAUTHORIZED, "Account is missing or inactive".to_string())
            }
            AuthError::NotUser => (
                StatusCode::FORBIDDEN,
                "User token required for this operation".to_string(),
            ),
            AuthError::InsufficientRole(role) => {
                (StatusCode::FORBIDDEN, format!("Role '{role}' required"))
            }
            AuthError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = json!({ "status": "error", "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                HeaderValue::from_static("Bearer realm=\"formwork\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequireAuth(authenticate(parts, state).await?))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequireUser(require_role(parts, state, Role::User).await?))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequireAdmin(require_role(parts, state, Role::Admin).await?))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireRoot {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequireRoot(require_role(parts, state, Role::Root).await?))
    }
}

/// Authenticates, then checks the user's role against `required`.
async fn require_role(
    parts: &mut Parts,
    state: &Arc<AppState>,
    required: Role,
) -> Result<User, AuthError> {
    let user = match authenticate(parts, state).await? {
        Principal::User(user) => user,
        Principal::Application(_) => return Err(AuthError::NotUser),
    };

    if !user.role.has(required) {
        return Err(AuthError::InsufficientRole(required));
    }

    Ok(user)
}

/// Resolves the request's principal, at most once per request.
async fn authenticate(parts: &mut Parts, state: &Arc<AppState>) -> Result<Principal, AuthError> {
    if let Some(principal) = parts.extensions.get::<Principal>() {
        return Ok(principal.clone());
    }

    let raw_token = extract_token(&parts.headers, &parts.uri).ok_or(AuthError::MissingAuth)?;

    let verified = state.tokens.verify(&raw_token).await.map_err(|e| {
        tracing::debug!("Rejected token: {e}");
        AuthError::InvalidToken(e)
    })?;

    let principal = match verified {
        VerifiedToken::User(claims) => {
            let user = store::blocking(&state.store, move |s| s.get_active_user(&claims.sub))
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load user: {e}");
                    AuthError::InternalError
                })?
                .ok_or(AuthError::InactiveUser)?;
            Principal::User(user)
        }
        VerifiedToken::Application(app) => Principal::Application(app),
    };

    parts.extensions.insert(principal.clone());
    Ok(principal)
}
