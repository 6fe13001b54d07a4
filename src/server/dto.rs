use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Application, Role};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
}

/// Returned once, when an application is registered. Later listings never
/// include the secret.
#[derive(Debug, Serialize)]
pub struct CreateApplicationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Application> for CreateApplicationResponse {
    fn from(app: Application) -> Self {
        Self {
            client_id: app.client_id,
            client_secret: app.client_secret,
            name: app.name,
            owner_id: app.owner_id,
            created_at: app.created_at,
        }
    }
}
