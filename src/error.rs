use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("not found")]
    NotFound,

    #[error("repo '{0}' does not exist")]
    ShapeNotFound(String),

    #[error("no record with uid '{0}'")]
    RecordNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("uid collision")]
    UidCollision,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("malformed token")]
    MalformedToken,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("could not resolve signing secret")]
    SecretResolutionFailed,

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
