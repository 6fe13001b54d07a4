use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{Credentials, RequireAdmin, RequireRoot};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, TokenResponse, UpdateUserRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::store;
use crate::types::{Role, User};
use crate::validation::validate_user_name;

/// Creates a user and provisions their local repo.
pub async fn create_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_name(&req.name).map_err(ApiError::bad_request)?;

    if req.role > Role::User && admin.role != Role::Root {
        return Err(ApiError::forbidden("Only root can grant elevated roles"));
    }

    let password_hash = req
        .password
        .as_deref()
        .map(|p| Credentials::new().hash(p))
        .transpose()?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        role: req.role,
        active: true,
        password_hash,
        repos: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    state.shapes.onboard(&user, state.ids.as_ref()).await?;

    let id = user.id.clone();
    let user = store::blocking(&state.store, move |s| s.get_user(&id))
        .await?
        .ok_or(Error::NotFound)?;

    tracing::info!("Admin {} created user {}", admin.name, user.name);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// Toggles `active` and changes roles. Role changes and any change to a root
/// account need root.
pub async fn update_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = store::blocking(&state.store, move |s| s.get_user(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let is_root = admin.role == Role::Root;
    if user.role == Role::Root && !is_root {
        return Err(ApiError::forbidden("Only root can modify a root account"));
    }
    if req.role.is_some_and(|role| role != user.role) && !is_root {
        return Err(ApiError::forbidden("Only root can change roles"));
    }

    if let Some(active) = req.active {
        user.active = active;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    user.updated_at = Utc::now();

    let record = user.clone();
    store::blocking(&state.store, move |s| s.update_user(&record)).await?;

    tracing::info!(
        "Admin {} updated user {} (active: {}, role: {})",
        admin.name,
        user.name,
        user.active,
        user.role
    );
    Ok(Json(ApiResponse::success(user)))
}

pub async fn create_user_token(
    _root: RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = store::blocking(&state.store, move |s| s.get_user(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let token = state.tokens.sign_user_token(&user.id, user.role)?;

    Ok(Json(ApiResponse::success(TokenResponse {
        token,
        expires_in: state.tokens.ttl().as_secs(),
    })))
}
