//! Default values and value coercion per base type

use super::{BaseType, SchemaError, SchemaResult};
use crate::graph::{PropertyMap, PropertyValue};
use chrono::{DateTime, Utc};

/// Default for a base type: `{}`, `[]`, `""`, `0`, `false`, now; `null` for references
pub fn default_value(base: &BaseType) -> PropertyValue {
    match base {
        BaseType::Object => PropertyValue::Object(PropertyMap::new()),
        BaseType::Array => PropertyValue::Array(Vec::new()),
        BaseType::String => PropertyValue::String(String::new()),
        BaseType::Number => PropertyValue::Number(0.0),
        BaseType::Boolean => PropertyValue::Boolean(false),
        BaseType::Date => PropertyValue::Date(Utc::now()),
        BaseType::Reference(_) => PropertyValue::Null,
    }
}

/// Coerce a raw value to the base type.
///
/// Strings are parsed (JSON for object/array, numeric, boolean, RFC 3339
/// dates); values already of the right kind pass through. References take
/// string ids only. Anything else is `InvalidValue`.
pub fn parse_value(base: &BaseType, raw: PropertyValue) -> SchemaResult<PropertyValue> {
    let invalid = |value: &PropertyValue| SchemaError::InvalidValue {
        expected: base.to_string(),
        value: value.to_string(),
    };

    match (base, raw) {
        (_, PropertyValue::Null) => Ok(PropertyValue::Null),
        (BaseType::Object, PropertyValue::String(s)) | (BaseType::Array, PropertyValue::String(s)) => {
            let json: serde_json::Value = serde_json::from_str(&s)
                .map_err(|_| invalid(&PropertyValue::String(s.clone())))?;
            let value = PropertyValue::from_json(json);
            match (base, &value) {
                (BaseType::Object, PropertyValue::Object(_)) | (BaseType::Array, PropertyValue::Array(_)) => {
                    Ok(value)
                }
                _ => Err(invalid(&value)),
            }
        }
        (BaseType::Number, PropertyValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(PropertyValue::Number)
            .map_err(|_| invalid(&PropertyValue::String(s))),
        (BaseType::Boolean, PropertyValue::String(s)) => match s.trim() {
            "true" => Ok(PropertyValue::Boolean(true)),
            "false" => Ok(PropertyValue::Boolean(false)),
            _ => Err(invalid(&PropertyValue::String(s.clone()))),
        },
        (BaseType::Date, PropertyValue::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|d| PropertyValue::Date(d.with_timezone(&Utc)))
            .map_err(|_| invalid(&PropertyValue::String(s))),
        (BaseType::Date, PropertyValue::Number(ms)) => DateTime::<Utc>::from_timestamp_millis(ms as i64)
            .map(PropertyValue::Date)
            .ok_or_else(|| invalid(&PropertyValue::Number(ms))),
        (BaseType::String, PropertyValue::Number(n)) => Ok(PropertyValue::String(n.to_string())),
        (BaseType::String, PropertyValue::Boolean(b)) => Ok(PropertyValue::String(b.to_string())),
        (BaseType::Reference(_), value @ PropertyValue::String(_)) => Ok(value),
        (BaseType::Reference(_), value) => Err(invalid(&value)),
        (base, value) if value.type_name() == base.as_str() => Ok(value),
        (_, value) => Err(invalid(&value)),
    }
}

/// `value` unchanged unless absent or null, else the default for `base`
pub fn ensure_type(base: &BaseType, value: Option<PropertyValue>) -> PropertyValue {
    match value {
        Some(v) if !v.is_null() => v,
        _ => default_value(base),
    }
}
