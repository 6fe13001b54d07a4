use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::{RequireUser, generate_client_credentials};
use crate::server::AppState;
use crate::server::dto::{CreateApplicationRequest, CreateApplicationResponse, TokenResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::store;
use crate::types::Application;
use crate::validation::validate_application_name;

pub async fn create_application(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_application_name(&req.name).map_err(ApiError::bad_request)?;

    let (client_id, client_secret) = generate_client_credentials();
    let app = Application {
        client_id,
        owner_id: user.id,
        name: req.name.trim().to_string(),
        client_secret,
        created_at: Utc::now(),
    };

    let record = app.clone();
    store::blocking(&state.store, move |s| s.create_application(&record)).await?;

    tracing::info!("Registered application {} for {}", app.client_id, app.owner_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateApplicationResponse::from(app))),
    ))
}

pub async fn list_applications(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let apps = store::blocking(&state.store, move |s| s.list_applications(&user.id)).await?;
    Ok(Json(ApiResponse::success(apps)))
}

pub async fn create_application_token(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = user.id.clone();
    let app = store::blocking(&state.store, move |s| s.find_application(&client_id, &owner_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    let token = state
        .tokens
        .sign_application_token(&app.client_id, &app.owner_id)?;

    Ok(Json(ApiResponse::success(TokenResponse {
        token,
        expires_in: state.tokens.ttl().as_secs(),
    })))
}
