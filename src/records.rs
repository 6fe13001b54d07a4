//! Generic record operations over synthesized models.
//!
//! Every operation resolves the shape, runs the permission gate against the
//! shape's owner, and only then touches the model or the store.

use std::sync::Arc;

use crate::auth::gate;
use crate::error::{Error, Result};
use crate::idgen::IdGenerator;
use crate::model::{Model, ModelSynthesizer, strip_identity_fields};
use crate::registry::ShapeRegistry;
use crate::types::{Document, Principal, Record};

const UID_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct RecordStore {
    shapes: ShapeRegistry,
    models: Arc<ModelSynthesizer>,
    ids: Arc<dyn IdGenerator>,
}

impl RecordStore {
    pub fn new(
        shapes: ShapeRegistry,
        models: Arc<ModelSynthesizer>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { shapes, models, ids }
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    /// Creates a record with a freshly generated uid.
    pub async fn create(
        &self,
        shape_name: &str,
        principal: &Principal,
        mut fields: Document,
    ) -> Result<Record> {
        let model = self.authorized_model(shape_name, principal).await?;
        strip_identity_fields(&mut fields);

        let mut attempt = 1;
        loop {
            let uid = self.ids.new_short_id();
            match model.insert(uid, fields.clone()).await {
                Err(Error::UidCollision) if attempt < UID_ATTEMPTS => {
                    tracing::warn!("uid collision in repo {}, retrying", shape_name);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Deep-merges `patch` onto the record `uid` and writes the result back.
    pub async fn update(
        &self,
        shape_name: &str,
        principal: &Principal,
        uid: &str,
        mut patch: Document,
    ) -> Result<Record> {
        let model = self.authorized_model(shape_name, principal).await?;
        let existing = model.find_by_uid(uid).await?;
        strip_identity_fields(&mut patch);
        model.update(&existing, patch).await
    }

    pub async fn get(&self, shape_name: &str, principal: &Principal, uid: &str) -> Result<Record> {
        let model = self.authorized_model(shape_name, principal).await?;
        model.find_by_uid(uid).await
    }

    pub async fn list_owned(&self, principal: &Principal) -> Result<Vec<String>> {
        match principal.as_user() {
            Some(user) => Ok(user.repos.clone()),
            None => self.shapes.list_owned(principal.owner_id()).await,
        }
    }

    async fn authorized_model(&self, shape_name: &str, principal: &Principal) -> Result<Arc<Model>> {
        let shape = self.shapes.get(shape_name).await?;
        gate::require_owner(principal, &shape.owner_id)?;
        self.models.synthesize(&shape).await
    }
}
