//! In-process test harness: a router over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use formwork::auth::Credentials;
use formwork::config::ServerConfig;
use formwork::server::{AppState, create_router};
use formwork::store::{SqliteStore, Store};
use formwork::types::{Role, User};

pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<SqliteStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(SqliteStore::in_memory().expect("open store"));
        store.initialize().expect("init schema");
        let state = Arc::new(AppState::new(
            store.clone(),
            SECRET.to_vec(),
            ServerConfig::default(),
        ));
        let router = create_router(Arc::clone(&state));
        Self {
            state,
            store,
            router,
        }
    }

    /// Inserts a user directly and returns it with a fresh token.
    pub fn user(&self, name: &str, role: Role) -> (User, String) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            active: true,
            password_hash: Some(Credentials::new().hash("pw").expect("hash")),
            repos: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_user(&user).expect("create user");
        let token = self
            .state
            .tokens
            .sign_user_token(&user.id, role)
            .expect("sign token");
        (user, token)
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
