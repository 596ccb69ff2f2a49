//! Adding and deleting fields on existing tables
//!
//! Planning is pure: [`plan_add_field`] and [`plan_delete_field`] compute the
//! new schema and the row change without touching storage. The
//! [`SchemaEvolutionManager`] then applies both halves inside one
//! [`SchemaTransaction`], planning against the schema observed under the
//! unit's lock so concurrent changes to the same table cannot interleave.

use crate::core::error::{CrudlyError, CrudlyResult, EvolutionError, TableError, ValidationError};
use crate::core::field::FieldDefinition;
use crate::core::schema::{ID_FIELD, TableSchema, validate_field_definition};
use crate::core::store::{ColumnChange, SchemaStore, SchemaTransaction};
use crate::core::validation::coerce_value;
use serde_json::Value;
use std::sync::Arc;

/// Compute the schema and row change for adding `name`
///
/// A required field needs a default. Any default supplied is coerced with the
/// entity rules before anything is written.
pub fn plan_add_field(
    schema: &TableSchema,
    name: &str,
    definition: &FieldDefinition,
    default: Option<&Value>,
) -> CrudlyResult<(TableSchema, ColumnChange)> {
    validate_field_definition(name, definition)?;

    if schema.contains(name) {
        return Err(EvolutionError::FieldAlreadyExists {
            field: name.to_string(),
        }
        .into());
    }

    let default = match default.filter(|value| !value.is_null()) {
        Some(value) => Some(
            coerce_value(name, definition, value).map_err(EvolutionError::InvalidDefaultValue)?,
        ),
        None if definition.optional => None,
        None => {
            return Err(EvolutionError::MissingDefaultValue {
                field: name.to_string(),
            }
            .into());
        }
    };

    let mut updated = schema.clone();
    updated.insert(name.to_string(), definition.clone());

    Ok((
        updated,
        ColumnChange::Add {
            name: name.to_string(),
            definition: definition.clone(),
            default,
        },
    ))
}

/// Compute the schema and row change for deleting `name`
pub fn plan_delete_field(
    schema: &TableSchema,
    name: &str,
) -> CrudlyResult<(TableSchema, ColumnChange)> {
    if name == ID_FIELD {
        return Err(ValidationError::ReservedFieldName {
            field: name.to_string(),
        }
        .into());
    }

    let mut updated = schema.clone();
    if updated.remove(name).is_none() {
        return Err(EvolutionError::FieldNotFound {
            field: name.to_string(),
        }
        .into());
    }

    Ok((
        updated,
        ColumnChange::Drop {
            name: name.to_string(),
        },
    ))
}

/// Applies schema changes atomically through a [`SchemaStore`]
#[derive(Clone)]
pub struct SchemaEvolutionManager {
    schema_store: Arc<dyn SchemaStore>,
}

impl SchemaEvolutionManager {
    pub fn new(schema_store: Arc<dyn SchemaStore>) -> Self {
        Self { schema_store }
    }

    /// Add a field, back-filling existing rows, and return the new schema
    pub async fn add_field(
        &self,
        tenant: &str,
        table: &str,
        name: &str,
        definition: FieldDefinition,
        default: Option<Value>,
    ) -> CrudlyResult<TableSchema> {
        let unit = self.begin(tenant, table).await?;
        let (schema, change) = plan_add_field(unit.schema(), name, &definition, default.as_ref())?;

        self.apply(table, unit, change, &schema).await?;

        tracing::info!(
            tenant = %tenant,
            table = %table,
            field = %name,
            field_type = %definition.field_type,
            "field added"
        );
        Ok(schema)
    }

    /// Delete a field from rows and schema, returning the new schema
    pub async fn delete_field(
        &self,
        tenant: &str,
        table: &str,
        name: &str,
    ) -> CrudlyResult<TableSchema> {
        let unit = self.begin(tenant, table).await?;
        let (schema, change) = plan_delete_field(unit.schema(), name)?;

        self.apply(table, unit, change, &schema).await?;

        tracing::info!(tenant = %tenant, table = %table, field = %name, "field deleted");
        Ok(schema)
    }

    async fn begin(&self, tenant: &str, table: &str) -> CrudlyResult<Box<dyn SchemaTransaction>> {
        self.schema_store
            .begin(tenant, table)
            .await?
            .ok_or_else(|| {
                TableError::NotFound {
                    table: table.to_string(),
                }
                .into()
            })
    }

    /// Row change, then metadata, then commit. Any failure drops the unit,
    /// which rolls it back.
    async fn apply(
        &self,
        table: &str,
        mut unit: Box<dyn SchemaTransaction>,
        change: ColumnChange,
        schema: &TableSchema,
    ) -> CrudlyResult<()> {
        if let Err(err) = unit.alter_columns(&change).await {
            return Err(conflict(table, err));
        }
        if let Err(err) = unit.persist_schema(schema).await {
            return Err(conflict(table, err));
        }
        unit.commit().await.map_err(|err| conflict(table, err))
    }
}

fn conflict(table: &str, err: CrudlyError) -> CrudlyError {
    tracing::warn!(table = %table, error = %err, "schema change rolled back");
    EvolutionError::Conflict {
        table: table.to_string(),
        source: Box::new(err),
    }
    .into()
}
