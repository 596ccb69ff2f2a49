//! Filter validation and comparator coercion

use super::coerce::coerce_comparator;
use crate::core::error::ValidationError;
use crate::core::query::{EntityFilter, FieldFilter, RawEntityFilter};
use crate::core::schema::TableSchema;

/// Check every filter against the schema and type its comparator
///
/// The implicit id field may be filtered by equality.
pub fn validate_entity_filter(
    filter: &RawEntityFilter,
    schema: &TableSchema,
) -> Result<EntityFilter, ValidationError> {
    let mut typed = EntityFilter::new();

    for (field, raw) in filter {
        let definition = schema
            .resolve(field)
            .ok_or_else(|| ValidationError::UnknownField {
                field: field.clone(),
            })?;

        if !definition.field_type.supports_operator(raw.operator) {
            return Err(ValidationError::UnsupportedOperator {
                field: field.clone(),
                operator: raw.operator,
                field_type: definition.field_type,
            });
        }

        let comparator = coerce_comparator(field, definition, &raw.comparator)?;

        typed.insert(
            field.clone(),
            FieldFilter {
                operator: raw.operator,
                comparator,
            },
        );
    }

    Ok(typed)
}
