use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Name of the field that carries a record's public identifier.
pub const UID_FIELD: &str = "uid";

const MAX_FIELD_NAME_LEN: usize = 64;

/// Shape classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Provisioned by the platform when a user is onboarded.
    #[serde(rename = "_local_")]
    Local,
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

impl ShapeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Local => "_local_",
            ShapeKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<ShapeKind> {
        match s {
            "_local_" => Some(ShapeKind::Local),
            "custom" => Some(ShapeKind::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Mixed,
}

/// How a field is filled in when a write leaves it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultRule {
    /// Current time at the moment of the write.
    Now,
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultRule>,
}

impl FieldConstraints {
    #[must_use]
    pub fn of(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            unique: false,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub is_system: bool,
    pub constraints: FieldConstraints,
}

impl FieldDescriptor {
    /// The platform-managed identifier field every shape carries.
    #[must_use]
    pub fn uid() -> Self {
        Self {
            name: UID_FIELD.to_string(),
            is_system: true,
            constraints: FieldConstraints {
                field_type: FieldType::String,
                required: true,
                unique: true,
                default: None,
            },
        }
    }

    #[must_use]
    pub fn is_uid(&self) -> bool {
        self.name == UID_FIELD
    }
}

/// A tenant's runtime-defined schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub owner_id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub fields: Vec<FieldDescriptor>,
    pub created_at: DateTime<Utc>,
}

impl Shape {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields other than `uid` that carry a uniqueness constraint.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.constraints.unique && !f.is_uid())
    }

    /// Checks the structural invariants of the field list.
    ///
    /// Names must differ ignoring case: unique fields back SQLite indexes,
    /// whose names are case-insensitive.
    pub fn validate_fields(fields: &[FieldDescriptor]) -> Result<()> {
        let mut seen = HashSet::new();
        for field in fields {
            validate_field_name(&field.name)?;
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(Error::Validation(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        match fields.iter().find(|f| f.is_uid()) {
            Some(uid) if *uid != FieldDescriptor::uid() => Err(Error::Validation(
                "field 'uid' is reserved and must be a required unique system string".to_string(),
            )),
            Some(_) => Ok(()),
            None => Err(Error::Validation("shape has no 'uid' field".to_string())),
        }
    }
}

fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("field name cannot be empty".to_string()));
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(Error::Validation(format!(
            "field name cannot exceed {MAX_FIELD_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(format!(
            "field name '{name}' can only contain alphanumeric characters and underscores"
        )));
    }
    if name.starts_with('_') {
        return Err(Error::Validation(format!(
            "field name '{name}' cannot start with an underscore"
        )));
    }
    Ok(())
}
