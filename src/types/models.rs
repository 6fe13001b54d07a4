use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Role;

/// A JSON object holding a record's domain fields.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// Names of the shapes this user owns.
    pub repos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A third-party application registered by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub client_id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub created_at: DateTime<Utc>,
}

/// A record as exposed to callers: the platform uid plus its domain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub uid: String,
    #[serde(flatten)]
    pub fields: Document,
}

/// A record row as the store holds it, including internal identifiers.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: i64,
    pub rev: i64,
    pub uid: String,
    pub body: Document,
}

impl From<StoredDocument> for Record {
    fn from(doc: StoredDocument) -> Self {
        Record {
            uid: doc.uid,
            fields: doc.body,
        }
    }
}
