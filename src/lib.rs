//! # Formwork
//!
//! A small backend-as-a-service server. Users define record shapes at runtime
//! and get authenticated CRUD over them, usable both as a standalone binary
//! and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! formwork = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use formwork::config::{ServerConfig, load_secret};
//! use formwork::server::{AppState, create_router};
//! use formwork::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//! let secret = load_secret(&config.secret_path()).unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), secret, config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `formwork` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod idgen;
pub mod model;
pub mod records;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;
pub mod validation;
