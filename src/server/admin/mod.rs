mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{patch, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(users::create_user))
        .route("/users/{id}", patch(users::update_user))
        .route("/users/{id}/token", post(users::create_user_token))
}
