use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use super::admin::admin_router;
use super::user::user_router;
use crate::auth::TokenService;
use crate::config::ServerConfig;
use crate::idgen::{IdGenerator, ShortIdGenerator};
use crate::model::ModelSynthesizer;
use crate::records::RecordStore;
use crate::registry::ShapeRegistry;
use crate::store::Store;

pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub shapes: ShapeRegistry,
    pub records: RecordStore,
    pub ids: Arc<dyn IdGenerator>,
}

impl AppState {
    /// Wires the services around `store`, signing with `secret`.
    pub fn new(store: Arc<dyn Store>, secret: Vec<u8>, config: ServerConfig) -> Self {
        Self::with_ids(store, secret, config, Arc::new(ShortIdGenerator))
    }

    pub fn with_ids(
        store: Arc<dyn Store>,
        secret: Vec<u8>,
        config: ServerConfig,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let shapes = ShapeRegistry::new(Arc::clone(&store));
        let models = Arc::new(ModelSynthesizer::new(Arc::clone(&store)));
        let records = RecordStore::new(shapes.clone(), models, Arc::clone(&ids));
        let tokens = TokenService::new(secret, config.token_ttl(), Arc::clone(&store));

        Self {
            config,
            store,
            tokens,
            shapes,
            records,
            ids,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "data": "OK", "error": null }))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
