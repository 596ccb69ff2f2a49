//! Field types, field definitions and the typed field value union

use crate::core::query::FilterOperator;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Name of a field inside a table schema
pub type FieldName = String;

/// The single timestamp profile accepted for `time` fields (UTC, literal `Z`)
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse a timestamp in the fixed [`TIME_FORMAT`] profile
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render a timestamp in the fixed [`TIME_FORMAT`] profile
pub fn format_time(value: &DateTime<Utc>) -> String {
    value.format(TIME_FORMAT).to_string()
}

/// The closed set of types a field can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Id,
    Integer,
    String,
    Boolean,
    Time,
    Enum,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Id => "id",
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Time => "time",
            FieldType::Enum => "enum",
        }
    }

    /// Whether a filter with `operator` may be applied to a field of this type
    ///
    /// Equality is legal everywhere; range comparisons only on integer and time.
    pub fn supports_operator(&self, operator: FilterOperator) -> bool {
        match self {
            FieldType::Integer | FieldType::Time => true,
            FieldType::Id | FieldType::String | FieldType::Boolean | FieldType::Enum => {
                operator == FilterOperator::Eq
            }
        }
    }

    /// Whether entities may be sorted by a field of this type
    pub fn is_orderable(&self) -> bool {
        match self {
            FieldType::Integer | FieldType::String | FieldType::Time => true,
            FieldType::Id | FieldType::Boolean | FieldType::Enum => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a single field in a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub optional: bool,

    /// Only ever true for the implicit id field
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,

    /// Allowed values, present iff `field_type` is `Enum`
    #[serde(default, rename = "values", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<BTreeSet<String>>,
}

impl FieldDefinition {
    /// A required field of the given (non-enum) type
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            optional: false,
            primary_key: false,
            enum_values: None,
        }
    }

    /// An optional field of the given (non-enum) type
    pub fn optional(field_type: FieldType) -> Self {
        Self {
            optional: true,
            ..Self::required(field_type)
        }
    }

    /// A required enum field accepting `values`
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enum_values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::required(FieldType::Enum)
        }
    }

    /// Mark this definition optional
    pub fn into_optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Definition of the implicit, system-managed id field
    pub fn id() -> Self {
        Self {
            field_type: FieldType::Id,
            optional: false,
            primary_key: true,
            enum_values: None,
        }
    }

    pub fn allows(&self, enum_value: &str) -> bool {
        self.enum_values
            .as_ref()
            .is_some_and(|values| values.contains(enum_value))
    }
}

/// A typed field value, one variant per [`FieldType`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Id(Uuid),
    Integer(i64),
    String(String),
    Boolean(bool),
    Time(DateTime<Utc>),
    EnumValue(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Id(_) => FieldType::Id,
            Field::Integer(_) => FieldType::Integer,
            Field::String(_) => FieldType::String,
            Field::Boolean(_) => FieldType::Boolean,
            Field::Time(_) => FieldType::Time,
            Field::EnumValue(_) => FieldType::Enum,
        }
    }

    /// Compare two values of the same variant; `None` across variants
    pub fn compare(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Id(a), Field::Id(b)) => Some(a.cmp(b)),
            (Field::Integer(a), Field::Integer(b)) => Some(a.cmp(b)),
            (Field::String(a), Field::String(b)) => Some(a.cmp(b)),
            (Field::Boolean(a), Field::Boolean(b)) => Some(a.cmp(b)),
            (Field::Time(a), Field::Time(b)) => Some(a.cmp(b)),
            (Field::EnumValue(a), Field::EnumValue(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Field::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Field::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) | Field::EnumValue(s) => Some(s),
            _ => None,
        }
    }

    /// The canonical JSON form of this value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Field::Id(id) => serde_json::Value::String(id.to_string()),
            Field::Integer(i) => serde_json::Value::from(*i),
            Field::String(s) | Field::EnumValue(s) => serde_json::Value::String(s.clone()),
            Field::Boolean(b) => serde_json::Value::Bool(*b),
            Field::Time(t) => serde_json::Value::String(format_time(t)),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Id(id) => write!(f, "{}", id),
            Field::Integer(i) => write!(f, "{}", i),
            Field::String(s) | Field::EnumValue(s) => f.write_str(s),
            Field::Boolean(b) => write!(f, "{}", b),
            Field::Time(t) => f.write_str(&format_time(t)),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Id(id) => serializer.collect_str(id),
            Field::Integer(i) => serializer.serialize_i64(*i),
            Field::String(s) | Field::EnumValue(s) => serializer.serialize_str(s),
            Field::Boolean(b) => serializer.serialize_bool(*b),
            Field::Time(t) => serializer.serialize_str(&format_time(t)),
        }
    }
}
