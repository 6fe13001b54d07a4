//! Runtime models synthesized from shapes.
//!
//! A [`Model`] is the validating storage handle for one shape. The
//! [`ModelSynthesizer`] builds each model once per process: building provisions
//! the shape's collection table and uniqueness indexes, and concurrent callers
//! missing on the same shape wait for a single build.

mod coerce;
mod merge;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

pub use coerce::normalize_default;
pub use merge::{IDENTITY_FIELDS, deep_merge, strip_identity_fields};

use crate::error::{Error, Result};
use crate::store::{self, Store};
use crate::types::{Document, Record, Shape};

pub struct Model {
    shape: Arc<Shape>,
    store: Arc<dyn Store>,
}

impl Model {
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Validates `fields` and persists them as a new record under `uid`.
    ///
    /// Identity keys and keys the shape does not declare are dropped first.
    /// Absent fields take their default; required fields must then be set.
    pub async fn insert(&self, uid: String, fields: Document) -> Result<Record> {
        if uid.is_empty() {
            return Err(Error::Validation("field 'uid' is required".to_string()));
        }

        let mut body = self.accept_input(fields)?;
        for field in self.shape.fields.iter().filter(|f| !f.is_uid()) {
            if !body.contains_key(&field.name) {
                if let Some(value) = coerce::default_value(field) {
                    body.insert(field.name.clone(), value);
                }
            }
            coerce::check_required(field, body.get(&field.name))?;
        }

        let shape_name = self.shape.name.clone();
        let stored = store::blocking(&self.store, move |s| {
            s.insert_document(&shape_name, &uid, &body)
        })
        .await?;
        Ok(stored.into())
    }

    pub async fn find_by_uid(&self, uid: &str) -> Result<Record> {
        let shape_name = self.shape.name.clone();
        let key = uid.to_string();
        store::blocking(&self.store, move |s| s.get_document(&shape_name, &key))
            .await?
            .map(Record::from)
            .ok_or_else(|| Error::RecordNotFound(uid.to_string()))
    }

    /// Merges `patch` onto `record` and writes the full result back.
    ///
    /// Stored keys the shape no longer declares are carried over as they are.
    pub async fn update(&self, record: &Record, patch: Document) -> Result<Record> {
        let patch = self.accept_input(patch)?;

        let mut merged = record.fields.clone();
        deep_merge(&mut merged, patch);
        for field in self.shape.fields.iter().filter(|f| !f.is_uid()) {
            coerce::check_required(field, merged.get(&field.name))?;
        }

        let shape_name = self.shape.name.clone();
        let uid = record.uid.clone();
        let stored = store::blocking(&self.store, move |s| {
            s.replace_document(&shape_name, &uid, &merged)
        })
        .await?;
        Ok(stored.into())
    }

    /// Turns client input into declared, coerced fields.
    fn accept_input(&self, mut input: Document) -> Result<Document> {
        let stripped = strip_identity_fields(&mut input);
        if stripped > 0 {
            tracing::debug!("Dropped {} identity fields from write to {}", stripped, self.shape.name);
        }

        let mut accepted = Document::new();
        for (key, value) in input {
            match self.shape.field(&key) {
                Some(field) => {
                    accepted.insert(key, coerce::coerce(field, value)?);
                }
                None => {
                    tracing::debug!("Ignoring undeclared field '{}' on {}", key, self.shape.name);
                }
            }
        }
        Ok(accepted)
    }
}

/// Builds and caches one [`Model`] per shape name.
pub struct ModelSynthesizer {
    store: Arc<dyn Store>,
    models: DashMap<String, Arc<OnceCell<Arc<Model>>>>,
}

impl ModelSynthesizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            models: DashMap::new(),
        }
    }

    /// Returns the model for `shape`, building it on first use.
    pub async fn synthesize(&self, shape: &Shape) -> Result<Arc<Model>> {
        let cell = Arc::clone(self.models.entry(shape.name.clone()).or_default().value());

        cell.get_or_try_init(|| self.build(shape.clone()))
            .await
            .map(Arc::clone)
    }

    /// Returns the cached model for `name` without building one.
    pub fn cached(&self, name: &str) -> Option<Arc<Model>> {
        self.models
            .get(name)
            .and_then(|cell| cell.get().map(Arc::clone))
    }

    async fn build(&self, shape: Shape) -> Result<Arc<Model>> {
        let name = shape.name.clone();
        let unique: Vec<String> = shape.unique_fields().map(|f| f.name.clone()).collect();
        store::blocking(&self.store, move |s| s.ensure_collection(&name, &unique)).await?;

        tracing::debug!("Synthesized model for repo {}", shape.name);
        Ok(Arc::new(Model {
            shape: Arc::new(shape),
            store: Arc::clone(&self.store),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use serde_json::{Value, json};

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::*;

    /// Store wrapper counting collection provisioning calls.
    struct CountingStore {
        inner: SqliteStore,
        ensures: AtomicUsize,
    }

    macro_rules! delegate {
        ($($name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
            $(fn $name(&self $(, $arg: $ty)*) -> $ret { self.inner.$name($($arg),*) })*
        };
    }

    impl Store for CountingStore {
        delegate! {
            initialize(&self) -> crate::error::Result<()>;
            create_user(&self, user: &User) -> crate::error::Result<()>;
            get_user(&self, id: &str) -> crate::error::Result<Option<User>>;
            get_user_by_name(&self, name: &str) -> crate::error::Result<Option<User>>;
            get_active_user(&self, id: &str) -> crate::error::Result<Option<User>>;
            update_user(&self, user: &User) -> crate::error::Result<()>;
            delete_user(&self, id: &str) -> crate::error::Result<()>;
            add_user_repo(&self, user_id: &str, shape_name: &str) -> crate::error::Result<()>;
            has_root_user(&self) -> crate::error::Result<bool>;
            create_application(&self, app: &Application) -> crate::error::Result<()>;
            find_application(&self, client_id: &str, owner_id: &str) -> crate::error::Result<Option<Application>>;
            list_applications(&self, owner_id: &str) -> crate::error::Result<Vec<Application>>;
            create_shape(&self, shape: &Shape) -> crate::error::Result<()>;
            get_shape(&self, name: &str) -> crate::error::Result<Option<Shape>>;
            list_shape_names(&self, owner_id: &str) -> crate::error::Result<Vec<String>>;
            insert_document(&self, shape_name: &str, uid: &str, body: &Document) -> crate::error::Result<StoredDocument>;
            get_document(&self, shape_name: &str, uid: &str) -> crate::error::Result<Option<StoredDocument>>;
            replace_document(&self, shape_name: &str, uid: &str, body: &Document) -> crate::error::Result<StoredDocument>;
            close(&self) -> crate::error::Result<()>;
        }

        fn ensure_collection(
            &self,
            shape_name: &str,
            unique_fields: &[String],
        ) -> crate::error::Result<()> {
            self.ensures.fetch_add(1, Ordering::SeqCst);
            // Widen the race window for concurrent misses.
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.inner.ensure_collection(shape_name, unique_fields)
        }
    }

    fn counting_store() -> Arc<CountingStore> {
        let inner = SqliteStore::in_memory().unwrap();
        inner.initialize().unwrap();
        Arc::new(CountingStore {
            inner,
            ensures: AtomicUsize::new(0),
        })
    }

    fn field(name: &str, constraints: FieldConstraints) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            is_system: false,
            constraints,
        }
    }

    fn people_shape() -> Shape {
        Shape {
            name: "people".to_string(),
            owner_id: "owner-1".to_string(),
            kind: ShapeKind::Custom,
            fields: vec![
                FieldDescriptor::uid(),
                field(
                    "email",
                    FieldConstraints {
                        required: true,
                        unique: true,
                        ..FieldConstraints::of(FieldType::String)
                    },
                ),
                field("age", FieldConstraints::of(FieldType::Number)),
                field(
                    "joined",
                    FieldConstraints {
                        default: Some(DefaultRule::Now),
                        ..FieldConstraints::of(FieldType::Date)
                    },
                ),
                field("profile", FieldConstraints::of(FieldType::Object)),
            ],
            created_at: Utc::now(),
        }
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn people_model() -> Arc<Model> {
        let store: Arc<dyn Store> = counting_store();
        ModelSynthesizer::new(store)
            .synthesize(&people_shape())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_misses_build_once() {
        let store = counting_store();
        let synth = Arc::new(ModelSynthesizer::new(store.clone()));
        let shape = people_shape();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let synth = Arc::clone(&synth);
            let shape = shape.clone();
            handles.push(tokio::spawn(async move {
                synth.synthesize(&shape).await.unwrap()
            }));
        }

        let mut models = Vec::new();
        for handle in handles {
            models.push(handle.await.unwrap());
        }

        assert_eq!(store.ensures.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));

        let again = synth.synthesize(&shape).await.unwrap();
        assert!(Arc::ptr_eq(&again, &models[0]));
        assert!(synth.cached("people").is_some());
        assert!(synth.cached("other").is_none());
    }

    #[tokio::test]
    async fn test_insert_applies_defaults_and_drops_unknown() {
        let model = people_model().await;

        let record = model
            .insert(
                "u1".to_string(),
                doc(json!({"email": "a@x.io", "age": "41", "nickname": "al", "_id": "evil"})),
            )
            .await
            .unwrap();

        assert_eq!(record.uid, "u1");
        assert_eq!(record.fields["age"], json!(41));
        assert!(record.fields["joined"].is_string());
        assert!(!record.fields.contains_key("nickname"));
        assert!(!record.fields.contains_key("_id"));
    }

    #[tokio::test]
    async fn test_insert_enforces_required_and_unique() {
        let model = people_model().await;

        let missing = model.insert("u1".to_string(), doc(json!({"age": 3}))).await;
        assert!(matches!(missing, Err(Error::Validation(_))));

        model
            .insert("u1".to_string(), doc(json!({"email": "a@x.io"})))
            .await
            .unwrap();
        let duplicate = model
            .insert("u2".to_string(), doc(json!({"email": "a@x.io"})))
            .await;
        assert!(matches!(duplicate, Err(Error::Validation(_))));

        let bad_type = model
            .insert("u3".to_string(), doc(json!({"email": "b@x.io", "age": "old"})))
            .await;
        assert!(matches!(bad_type, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_insert_never_takes_uid_from_fields() {
        let model = people_model().await;

        let record = model
            .insert("real".to_string(), doc(json!({"email": "a@x.io", "uid": "forged"})))
            .await
            .unwrap();
        assert_eq!(record.uid, "real");
        assert!(matches!(
            model.find_by_uid("forged").await,
            Err(Error::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_identity() {
        let model = people_model().await;
        let created = model
            .insert(
                "u1".to_string(),
                doc(json!({"email": "a@x.io", "profile": {"city": "Oslo", "zip": "0150"}})),
            )
            .await
            .unwrap();

        let updated = model
            .update(
                &created,
                doc(json!({"uid": "other", "__v": 7, "profile": {"zip": "0151"}, "age": 5})),
            )
            .await
            .unwrap();

        assert_eq!(updated.uid, "u1");
        assert_eq!(updated.fields["email"], json!("a@x.io"));
        assert_eq!(updated.fields["age"], json!(5));
        assert_eq!(updated.fields["profile"], json!({"city": "Oslo", "zip": "0151"}));
        assert_eq!(model.find_by_uid("u1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_cannot_clear_required_field() {
        let model = people_model().await;
        let created = model
            .insert("u1".to_string(), doc(json!({"email": "a@x.io"})))
            .await
            .unwrap();

        let result = model.update(&created, doc(json!({"email": null}))).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
