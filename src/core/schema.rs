//! Table schemas and schema validation

use crate::core::error::ValidationError;
use crate::core::field::{FieldDefinition, FieldName, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Name of the implicit, system-managed identity field
pub const ID_FIELD: &str = "id";

fn id_definition() -> &'static FieldDefinition {
    static ID_DEFINITION: OnceLock<FieldDefinition> = OnceLock::new();
    ID_DEFINITION.get_or_init(FieldDefinition::id)
}

/// The user-defined fields of a table
///
/// The id field is never stored here. It is injected by table creation and
/// reachable through [`TableSchema::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    fields: BTreeMap<FieldName, FieldDefinition>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures
    pub fn with_field(mut self, name: impl Into<FieldName>, definition: FieldDefinition) -> Self {
        self.fields.insert(name.into(), definition);
        self
    }

    /// Definition of a user field
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Definition of any addressable field, including the implicit id
    pub fn resolve(&self, name: &str) -> Option<&FieldDefinition> {
        if name == ID_FIELD {
            return Some(id_definition());
        }
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldName, &FieldDefinition)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn insert(&mut self, name: FieldName, definition: FieldDefinition) {
        self.fields.insert(name, definition);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<FieldDefinition> {
        self.fields.remove(name)
    }
}

impl FromIterator<(FieldName, FieldDefinition)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (FieldName, FieldDefinition)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Check a user-supplied schema before it is stored
pub fn validate_table_schema(schema: &TableSchema) -> Result<(), ValidationError> {
    if schema.contains(ID_FIELD) {
        return Err(ValidationError::ReservedFieldName {
            field: ID_FIELD.to_string(),
        });
    }

    for (name, definition) in schema.fields() {
        validate_field_definition(name, definition)?;
    }

    Ok(())
}

/// Check a single user field definition
pub fn validate_field_definition(
    name: &str,
    definition: &FieldDefinition,
) -> Result<(), ValidationError> {
    if name == ID_FIELD {
        return Err(ValidationError::ReservedFieldName {
            field: name.to_string(),
        });
    }

    if definition.primary_key {
        return Err(ValidationError::InvalidSchema {
            field: name.to_string(),
            reason: "only the implicit id field may be a primary key".to_string(),
        });
    }

    match (&definition.field_type, &definition.enum_values) {
        (FieldType::Enum, None) => Err(ValidationError::InvalidSchema {
            field: name.to_string(),
            reason: "enum definition must include a values array".to_string(),
        }),
        (FieldType::Enum, Some(values)) if values.is_empty() => {
            Err(ValidationError::InvalidSchema {
                field: name.to_string(),
                reason: "enum values array must not be empty".to_string(),
            })
        }
        (FieldType::Enum, Some(_)) => Ok(()),
        (other, Some(_)) => Err(ValidationError::InvalidSchema {
            field: name.to_string(),
            reason: format!("non enum type '{}' has a values array", other),
        }),
        (_, None) => Ok(()),
    }
}
