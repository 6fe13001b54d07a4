mod applications;
mod auth;
mod repos;
mod shapes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Login
        .route("/auth/login", post(auth::login))
        // Records
        .route("/repos", get(repos::list_repos))
        .route("/repos/{shape}", post(repos::create_record))
        .route(
            "/repos/{shape}/{uid}",
            get(repos::get_record).put(repos::update_record),
        )
        // Shapes
        .route("/shapes", post(shapes::create_shape))
        .route("/shapes/{name}", get(shapes::get_shape))
        // Applications
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/{client_id}/token",
            post(applications::create_application_token),
        )
}
