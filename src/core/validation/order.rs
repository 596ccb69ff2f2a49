//! Order validation and tiebreaker normalization

use crate::core::error::ValidationError;
use crate::core::query::{EntityOrder, OrderEntry};
use crate::core::schema::{ID_FIELD, TableSchema};

/// Validate sort keys and append the `id asc` tiebreaker
///
/// Only integer, string and time fields sort. Entries on the implicit id field
/// are accepted as the tiebreaker, so normalizing an already normalized order
/// returns it unchanged.
pub fn validate_and_normalize_order(
    order: &[OrderEntry],
    schema: &TableSchema,
) -> Result<EntityOrder, ValidationError> {
    for entry in order {
        if entry.field == ID_FIELD {
            continue;
        }

        let definition = schema
            .get(&entry.field)
            .ok_or_else(|| ValidationError::UnknownField {
                field: entry.field.clone(),
            })?;

        if !definition.field_type.is_orderable() {
            return Err(ValidationError::UnsupportedOrder {
                field: entry.field.clone(),
                field_type: definition.field_type,
            });
        }
    }

    let mut normalized = order.to_vec();
    if !normalized.iter().any(|entry| entry.field == ID_FIELD) {
        normalized.push(OrderEntry::asc(ID_FIELD));
    }

    Ok(normalized)
}
