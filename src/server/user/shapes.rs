use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::{RequireAuth, RequireUser, require_owner};
use crate::registry::ShapeDefinition;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};

pub async fn create_shape(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(definition): Json<ShapeDefinition>,
) -> Result<impl IntoResponse, ApiError> {
    let shape = state.shapes.create(&user.id, definition).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(shape))))
}

pub async fn get_shape(
    RequireAuth(principal): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let shape = state.shapes.get(&name).await?;
    require_owner(&principal, &shape.owner_id)?;
    Ok(Json(ApiResponse::success(shape)))
}
