//! Schema registry: stores tenant shape definitions.
//!
//! Shapes are created once and never structurally changed afterwards; the
//! model cache relies on that.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::idgen::IdGenerator;
use crate::model::normalize_default;
use crate::store::{self, Store};
use crate::types::{
    DefaultRule, FieldConstraints, FieldDescriptor, FieldType, Shape, ShapeKind, User,
};
use crate::validation::validate_shape_name;

/// A shape as submitted for creation. The owner is supplied separately.
#[derive(Debug, Clone, Deserialize)]
pub struct ShapeDefinition {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: ShapeKind,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ShapeDefinition {
    /// The shape every user is given when onboarded.
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        let system = |name: &str, constraints: FieldConstraints| FieldDescriptor {
            name: name.to_string(),
            is_system: true,
            constraints,
        };
        let now = || FieldConstraints {
            default: Some(DefaultRule::Now),
            ..FieldConstraints::of(FieldType::Date)
        };

        Self {
            name: name.into(),
            kind: ShapeKind::Local,
            fields: vec![
                FieldDescriptor::uid(),
                system(
                    "mobile",
                    FieldConstraints {
                        required: true,
                        ..FieldConstraints::of(FieldType::String)
                    },
                ),
                system("createDate", now()),
                system("latestActive", now()),
            ],
        }
    }
}

#[derive(Clone)]
pub struct ShapeRegistry {
    store: Arc<dyn Store>,
}

impl ShapeRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, name: &str) -> Result<Shape> {
        let key = name.to_string();
        store::blocking(&self.store, move |s| s.get_shape(&key))
            .await?
            .ok_or_else(|| Error::ShapeNotFound(name.to_string()))
    }

    /// Creates a shape owned by `owner_id` and records it in the owner's repo list.
    ///
    /// A definition without a `uid` field gets the standard system one prepended.
    pub async fn create(&self, owner_id: &str, definition: ShapeDefinition) -> Result<Shape> {
        validate_shape_name(&definition.name).map_err(Error::Validation)?;

        let mut fields = definition.fields;
        if !fields.iter().any(FieldDescriptor::is_uid) {
            fields.insert(0, FieldDescriptor::uid());
        }
        Shape::validate_fields(&fields)?;
        for field in &mut fields {
            normalize_default(field)?;
        }

        let shape = Shape {
            name: definition.name,
            owner_id: owner_id.to_string(),
            kind: definition.kind,
            fields,
            created_at: Utc::now(),
        };

        let record = shape.clone();
        store::blocking(&self.store, move |s| {
            s.create_shape(&record)?;
            match s.add_user_repo(&record.owner_id, &record.name) {
                Err(Error::NotFound) => {
                    tracing::warn!(
                        "Owner {} of repo {} is not a user",
                        record.owner_id,
                        record.name
                    );
                    Ok(())
                }
                other => other,
            }
        })
        .await?;

        tracing::info!(
            "Created repo {} ({} fields) for {}",
            shape.name,
            shape.fields.len(),
            shape.owner_id
        );
        Ok(shape)
    }

    /// Provisions the `_local_` shape a new user starts with.
    pub async fn create_local(&self, owner_id: &str, ids: &dyn IdGenerator) -> Result<Shape> {
        let name = format!("repo_{}", ids.new_short_id());
        self.create(owner_id, ShapeDefinition::local(name)).await
    }

    /// Stores `user` and provisions their local shape. The user row is removed
    /// again if provisioning fails.
    pub async fn onboard(&self, user: &User, ids: &dyn IdGenerator) -> Result<Shape> {
        let record = user.clone();
        store::blocking(&self.store, move |s| s.create_user(&record)).await?;

        match self.create_local(&user.id, ids).await {
            Ok(shape) => Ok(shape),
            Err(e) => {
                tracing::warn!("Provisioning failed for {}, removing user: {e}", user.name);
                let id = user.id.clone();
                if let Err(cleanup) =
                    store::blocking(&self.store, move |s| s.delete_user(&id)).await
                {
                    tracing::error!("Failed to remove user {}: {cleanup}", user.id);
                }
                Err(e)
            }
        }
    }

    pub async fn list_owned(&self, owner_id: &str) -> Result<Vec<String>> {
        let owner = owner_id.to_string();
        store::blocking(&self.store, move |s| s.list_shape_names(&owner)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn registry() -> ShapeRegistry {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        ShapeRegistry::new(Arc::new(store))
    }

    fn definition(name: &str, fields: Vec<FieldDescriptor>) -> ShapeDefinition {
        ShapeDefinition {
            name: name.to_string(),
            kind: ShapeKind::Custom,
            fields,
        }
    }

    #[tokio::test]
    async fn test_create_prepends_uid() {
        let registry = registry();
        let title = FieldDescriptor {
            name: "title".to_string(),
            is_system: false,
            constraints: FieldConstraints::of(FieldType::String),
        };

        let shape = registry
            .create("owner-1", definition("notes", vec![title]))
            .await
            .unwrap();

        assert_eq!(shape.fields.len(), 2);
        assert!(shape.fields[0].is_uid());
        assert_eq!(registry.get("notes").await.unwrap(), shape);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let registry = registry();
        registry
            .create("owner-1", definition("notes", vec![]))
            .await
            .unwrap();

        let again = registry
            .create("owner-2", definition("notes", vec![]))
            .await;
        assert!(matches!(again, Err(Error::AlreadyExists(_))));
        assert_eq!(registry.get("notes").await.unwrap().owner_id, "owner-1");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_name() {
        let registry = registry();
        let result = registry
            .create("owner-1", definition("bad name", vec![]))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_missing_shape() {
        let registry = registry();
        assert!(matches!(
            registry.get("nope").await,
            Err(Error::ShapeNotFound(name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn test_list_owned() {
        let registry = registry();
        registry
            .create("owner-1", definition("b", vec![]))
            .await
            .unwrap();
        registry
            .create("owner-1", definition("a", vec![]))
            .await
            .unwrap();
        registry
            .create("owner-2", definition("c", vec![]))
            .await
            .unwrap();

        assert_eq!(registry.list_owned("owner-1").await.unwrap(), vec!["a", "b"]);
    }

    fn user(id: &str, name: &str) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            name: name.to_string(),
            role: crate::types::Role::User,
            active: true,
            password_hash: None,
            repos: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    struct FixedIds(&'static str);

    impl IdGenerator for FixedIds {
        fn new_short_id(&self) -> String {
            self.0.to_string()
        }
    }

    #[tokio::test]
    async fn test_create_local_records_repo_on_owner() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        store.create_user(&user("u1", "alice")).unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let registry = ShapeRegistry::new(Arc::clone(&store));

        let shape = registry
            .create_local("u1", &crate::idgen::ShortIdGenerator)
            .await
            .unwrap();

        assert!(shape.name.starts_with("repo_"));
        assert_eq!(shape.kind, ShapeKind::Local);
        assert_eq!(store.get_user("u1").unwrap().unwrap().repos, vec![shape.name]);
    }

    #[tokio::test]
    async fn test_names_differing_only_in_case_collide() {
        let registry = registry();
        registry
            .create("alice", definition("Notes", vec![]))
            .await
            .unwrap();

        let taken = registry.create("bob", definition("notes", vec![])).await;
        assert!(matches!(taken, Err(Error::AlreadyExists(_))));
        assert_eq!(registry.get("notes").await.unwrap().owner_id, "alice");
        assert!(registry.list_owned("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_checks_defaults_against_field_type() {
        let registry = registry();
        let count = |default: serde_json::Value| FieldDescriptor {
            name: "count".to_string(),
            is_system: false,
            constraints: FieldConstraints {
                default: Some(DefaultRule::Value(default)),
                ..FieldConstraints::of(FieldType::Number)
            },
        };

        let rejected = registry
            .create("o", definition("n", vec![count(serde_json::json!("not-a-number"))]))
            .await;
        assert!(matches!(rejected, Err(Error::Validation(_))));
        assert!(matches!(registry.get("n").await, Err(Error::ShapeNotFound(_))));

        let shape = registry
            .create("o", definition("n", vec![count(serde_json::json!("7"))]))
            .await
            .unwrap();
        assert_eq!(
            shape.field("count").unwrap().constraints.default,
            Some(DefaultRule::Value(serde_json::json!(7)))
        );
    }

    #[tokio::test]
    async fn test_onboard_provisions_local_shape() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let registry = ShapeRegistry::new(Arc::clone(&store));

        let shape = registry
            .onboard(&user("u1", "alice"), &FixedIds("abc"))
            .await
            .unwrap();

        assert_eq!(shape.name, "repo_abc");
        assert_eq!(store.get_user("u1").unwrap().unwrap().repos, vec!["repo_abc"]);
    }

    #[tokio::test]
    async fn test_onboard_removes_user_when_provisioning_fails() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let registry = ShapeRegistry::new(Arc::clone(&store));
        registry
            .create("someone-else", definition("repo_abc", vec![]))
            .await
            .unwrap();

        let result = registry.onboard(&user("u1", "alice"), &FixedIds("abc")).await;

        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert!(store.get_user("u1").unwrap().is_none());
        assert!(store.get_user_by_name("alice").unwrap().is_none());
    }

    #[test]
    fn test_local_definition_is_valid() {
        let local = ShapeDefinition::local("repo_x");
        assert_eq!(local.kind, ShapeKind::Local);
        assert!(Shape::validate_fields(&local.fields).is_ok());
        assert!(local.fields.iter().all(|f| f.is_system));
    }
}
