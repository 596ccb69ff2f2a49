//! Full-entity and partial-entity validation

use super::coerce::coerce_value;
use crate::core::entity::{Entity, PartialEntity, RawEntity};
use crate::core::error::ValidationError;
use crate::core::field::FieldDefinition;
use crate::core::schema::{ID_FIELD, TableSchema};

fn lookup<'a>(
    schema: &'a TableSchema,
    field: &str,
) -> Result<&'a FieldDefinition, ValidationError> {
    if field == ID_FIELD {
        return Err(ValidationError::ReservedFieldName {
            field: field.to_string(),
        });
    }

    schema.get(field).ok_or_else(|| ValidationError::UnknownField {
        field: field.to_string(),
    })
}

/// Validate and coerce a complete entity
///
/// Every present field must exist in the schema and coerce to its type; every
/// required field must be present. A `null` on an optional field leaves it
/// unset. The returned entity carries the typed values; the raw input is not
/// meant to be used afterwards.
pub fn validate_entity(raw: &RawEntity, schema: &TableSchema) -> Result<Entity, ValidationError> {
    let mut entity = Entity::new();

    for (name, value) in raw {
        let definition = lookup(schema, name)?;

        if value.is_null() && definition.optional {
            continue;
        }

        entity.insert(name.clone(), coerce_value(name, definition, value)?);
    }

    for (name, definition) in schema.fields() {
        if !definition.optional && !raw.contains_key(name) {
            return Err(ValidationError::MissingField {
                field: name.clone(),
            });
        }
    }

    Ok(entity)
}

/// Validate and coerce a patch
///
/// Only the fields present are checked; absence means "leave unchanged".
/// A `null` clears an optional field and is rejected on a required one.
pub fn validate_partial_entity(
    raw: &RawEntity,
    schema: &TableSchema,
) -> Result<PartialEntity, ValidationError> {
    let mut partial = PartialEntity::new();

    for (name, value) in raw {
        let definition = lookup(schema, name)?;

        let typed = if value.is_null() && definition.optional {
            None
        } else {
            Some(coerce_value(name, definition, value)?)
        };

        partial.insert(name.clone(), typed);
    }

    Ok(partial)
}
