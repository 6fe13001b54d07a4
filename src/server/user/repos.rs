use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::types::Document;

fn body(payload: Result<Json<Document>, JsonRejection>) -> Result<Document, ApiError> {
    payload
        .map(|Json(doc)| doc)
        .map_err(|e| Error::BadRequest(e.body_text()).into())
}

pub async fn list_repos(
    RequireAuth(principal): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let names = state.records.list_owned(&principal).await?;
    Ok(Json(ApiResponse::success(names)))
}

pub async fn create_record(
    RequireAuth(principal): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(shape): Path<String>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = body(payload)?;
    let record = state.records.create(&shape, &principal, fields).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn get_record(
    RequireAuth(principal): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((shape, uid)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.records.get(&shape, &principal, &uid).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn update_record(
    RequireAuth(principal): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((shape, uid)): Path<(String, String)>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = body(payload)?;
    let record = state.records.update(&shape, &principal, &uid, patch).await?;
    Ok(Json(ApiResponse::success(record)))
}
