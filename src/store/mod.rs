mod schema;
mod sqlite;

use std::sync::Arc;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;
    /// Returns the user only while its `active` flag is set.
    fn get_active_user(&self, id: &str) -> Result<Option<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<()>;
    fn add_user_repo(&self, user_id: &str, shape_name: &str) -> Result<()>;
    fn has_root_user(&self) -> Result<bool>;

    // Application operations
    fn create_application(&self, app: &Application) -> Result<()>;
    fn find_application(&self, client_id: &str, owner_id: &str) -> Result<Option<Application>>;
    fn list_applications(&self, owner_id: &str) -> Result<Vec<Application>>;

    // Shape operations
    fn create_shape(&self, shape: &Shape) -> Result<()>;
    fn get_shape(&self, name: &str) -> Result<Option<Shape>>;
    fn list_shape_names(&self, owner_id: &str) -> Result<Vec<String>>;

    // Collection operations (one backing table per shape)
    fn ensure_collection(&self, shape_name: &str, unique_fields: &[String]) -> Result<()>;
    fn insert_document(&self, shape_name: &str, uid: &str, body: &Document)
    -> Result<StoredDocument>;
    fn get_document(&self, shape_name: &str, uid: &str) -> Result<Option<StoredDocument>>;
    /// Overwrites the stored body of `uid` and bumps its revision. No
    /// revision check is made; the last write wins.
    fn replace_document(&self, shape_name: &str, uid: &str, body: &Document)
    -> Result<StoredDocument>;

    /// Flushes pending writes before shutdown.
    fn close(&self) -> Result<()>;
}

/// Runs a store call on the blocking thread pool.
///
/// Once dispatched the call runs to completion even if the awaiting request
/// is dropped.
pub async fn blocking<T, F>(store: &Arc<dyn Store>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref())).await?
}
