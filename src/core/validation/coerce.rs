//! Per-type coercion of raw input into typed field values
//!
//! Two entry points share one rule table: JSON payload values (entities,
//! patches, default values) and raw query-string comparators (filters).

use crate::core::error::ValidationError;
use crate::core::field::{Field, FieldDefinition, FieldType, parse_time};
use serde_json::Value;
use uuid::Uuid;

/// Coerce a JSON value into the typed value `definition` declares
pub fn coerce_value(
    field: &str,
    definition: &FieldDefinition,
    value: &Value,
) -> Result<Field, ValidationError> {
    let mismatch = || ValidationError::FieldTypeMismatch {
        field: field.to_string(),
        expected: definition.field_type,
    };

    match definition.field_type {
        FieldType::Id => {
            let s = value.as_str().ok_or_else(mismatch)?;
            Uuid::parse_str(s).map(Field::Id).map_err(|_| mismatch())
        }
        FieldType::Integer => coerce_integer(value).map(Field::Integer).ok_or_else(mismatch),
        FieldType::String => value
            .as_str()
            .map(|s| Field::String(s.to_string()))
            .ok_or_else(mismatch),
        FieldType::Boolean => value.as_bool().map(Field::Boolean).ok_or_else(mismatch),
        FieldType::Time => {
            let s = value.as_str().ok_or_else(mismatch)?;
            parse_time(s).map(Field::Time).ok_or_else(mismatch)
        }
        FieldType::Enum => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if definition.allows(s) {
                Ok(Field::EnumValue(s.to_string()))
            } else {
                Err(ValidationError::EnumValueInvalid {
                    field: field.to_string(),
                    value: s.to_string(),
                    allowed: definition
                        .enum_values
                        .iter()
                        .flatten()
                        .cloned()
                        .collect(),
                })
            }
        }
    }
}

/// Coerce a raw filter comparator into the typed value `definition` declares
pub fn coerce_comparator(
    field: &str,
    definition: &FieldDefinition,
    comparator: &str,
) -> Result<Field, ValidationError> {
    let typed = match definition.field_type {
        FieldType::Id => Uuid::parse_str(comparator).ok().map(Field::Id),
        FieldType::Integer => comparator.trim().parse::<i64>().ok().map(Field::Integer),
        FieldType::String => Some(Field::String(comparator.to_string())),
        FieldType::Boolean => match comparator {
            "true" => Some(Field::Boolean(true)),
            "false" => Some(Field::Boolean(false)),
            _ => None,
        },
        FieldType::Time => parse_time(comparator).map(Field::Time),
        FieldType::Enum => definition
            .allows(comparator)
            .then(|| Field::EnumValue(comparator.to_string())),
    };

    typed.ok_or_else(|| ValidationError::InvalidComparator {
        field: field.to_string(),
        comparator: comparator.to_string(),
    })
}

/// Numbers with a zero fractional part that fit in an `i64`
fn coerce_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };

    if let Some(i) = number.as_i64() {
        return Some(i);
    }

    let f = number.as_f64()?;
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}
