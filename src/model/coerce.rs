use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::types::{DefaultRule, FieldDescriptor, FieldType};

/// Converts `value` into the representation stored for `field`.
///
/// `null` passes through untouched; required-ness is checked separately.
pub fn coerce(field: &FieldDescriptor, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }

    let coerced = match field.constraints.field_type {
        FieldType::Mixed => Some(value),
        FieldType::String => match value {
            Value::String(_) => Some(value),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Number => match value {
            Value::Number(_) => Some(value),
            Value::String(s) => parse_number(s.trim()).map(Value::Number),
            _ => None,
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Some(value),
            Value::String(s) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Date => match &value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| format_date(dt.with_timezone(&Utc))),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(format_date),
            _ => None,
        },
        FieldType::Object => value.is_object().then_some(value),
        FieldType::Array => value.is_array().then_some(value),
    };

    coerced.ok_or_else(|| {
        Error::Validation(format!(
            "field '{}' expects a {:?} value",
            field.name, field.constraints.field_type
        ))
    })
}

/// Value a field takes when a write leaves it out.
pub fn default_value(field: &FieldDescriptor) -> Option<Value> {
    match field.constraints.default.as_ref()? {
        DefaultRule::Now => Some(format_date(Utc::now())),
        DefaultRule::Value(value) => Some(value.clone()),
    }
}

/// Checks a field's declared default against its type, keeping the coerced form.
pub fn normalize_default(field: &mut FieldDescriptor) -> Result<()> {
    let rule = match field.constraints.default.take() {
        None => return Ok(()),
        Some(DefaultRule::Now) if field.constraints.field_type != FieldType::Date => {
            return Err(Error::Validation(format!(
                "field '{}' can only default to now when it is a date",
                field.name
            )));
        }
        Some(DefaultRule::Now) => DefaultRule::Now,
        Some(DefaultRule::Value(value)) => DefaultRule::Value(coerce(field, value)?),
    };
    field.constraints.default = Some(rule);
    Ok(())
}

/// Fails if a required field is missing, null, or an empty string.
pub fn check_required(field: &FieldDescriptor, value: Option<&Value>) -> Result<()> {
    if !field.constraints.required {
        return Ok(());
    }
    match value {
        None | Some(Value::Null) => Err(Error::Validation(format!(
            "field '{}' is required",
            field.name
        ))),
        Some(Value::String(s)) if s.is_empty() => Err(Error::Validation(format!(
            "field '{}' is required",
            field.name
        ))),
        Some(_) => Ok(()),
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn format_date(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
