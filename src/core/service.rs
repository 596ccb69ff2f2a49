//! Table and entity services
//!
//! These compose the pure validators with the storage collaborators. Every
//! operation resolves the table schema first, so a missing table surfaces as
//! [`TableError::NotFound`] before any row is touched.
//!
//! Writes hand the schema they validated against to the store. If a field is
//! added or deleted in between, the write fails with
//! [`TableError::SchemaChanged`] and nothing is stored.

use crate::config::PaginationConfig;
use crate::core::entity::{Entity, RawEntity};
use crate::core::error::{CrudlyError, CrudlyResult, EntityError, TableError};
use crate::core::evolution::SchemaEvolutionManager;
use crate::core::field::{Field, FieldDefinition};
use crate::core::plan::{build_query_plan, predicates_from_filter};
use crate::core::query::{EntityPage, OrderEntry, PaginationParams, QueryParams, RawEntityFilter};
use crate::core::schema::{ID_FIELD, TableSchema};
use crate::core::store::{EntityStore, SchemaStore};
use crate::core::validation::{
    validate_and_normalize_order, validate_entity, validate_entity_filter,
    validate_partial_entity, validate_table_schema,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

async fn resolve_schema(
    store: &dyn SchemaStore,
    tenant: &str,
    table: &str,
) -> CrudlyResult<TableSchema> {
    store
        .fetch_schema(tenant, table)
        .await?
        .ok_or_else(|| {
            TableError::NotFound {
                table: table.to_string(),
            }
            .into()
        })
}

/// Table lifecycle and schema evolution
#[derive(Clone)]
pub struct TableService {
    schema_store: Arc<dyn SchemaStore>,
    evolution: SchemaEvolutionManager,
}

impl TableService {
    pub fn new(schema_store: Arc<dyn SchemaStore>) -> Self {
        Self {
            evolution: SchemaEvolutionManager::new(schema_store.clone()),
            schema_store,
        }
    }

    pub async fn create_table(
        &self,
        tenant: &str,
        table: &str,
        schema: TableSchema,
    ) -> CrudlyResult<TableSchema> {
        validate_table_schema(&schema)?;
        self.schema_store.create_table(tenant, table, &schema).await?;

        tracing::info!(tenant = %tenant, table = %table, fields = schema.len(), "table created");
        Ok(schema)
    }

    pub async fn get_schema(&self, tenant: &str, table: &str) -> CrudlyResult<TableSchema> {
        resolve_schema(self.schema_store.as_ref(), tenant, table).await
    }

    pub async fn list_schemas(&self, tenant: &str) -> CrudlyResult<BTreeMap<String, TableSchema>> {
        self.schema_store.list_schemas(tenant).await
    }

    pub async fn delete_table(&self, tenant: &str, table: &str) -> CrudlyResult<()> {
        if !self.schema_store.drop_table(tenant, table).await? {
            return Err(TableError::NotFound {
                table: table.to_string(),
            }
            .into());
        }

        tracing::info!(tenant = %tenant, table = %table, "table deleted");
        Ok(())
    }

    pub async fn add_field(
        &self,
        tenant: &str,
        table: &str,
        name: &str,
        definition: FieldDefinition,
        default: Option<Value>,
    ) -> CrudlyResult<TableSchema> {
        self.evolution
            .add_field(tenant, table, name, definition, default)
            .await
    }

    pub async fn delete_field(
        &self,
        tenant: &str,
        table: &str,
        name: &str,
    ) -> CrudlyResult<TableSchema> {
        self.evolution.delete_field(tenant, table, name).await
    }
}

/// Entity reads and writes against a table's schema
#[derive(Clone)]
pub struct EntityService {
    schema_store: Arc<dyn SchemaStore>,
    entity_store: Arc<dyn EntityStore>,
    pagination: PaginationConfig,
}

impl EntityService {
    pub fn new(schema_store: Arc<dyn SchemaStore>, entity_store: Arc<dyn EntityStore>) -> Self {
        Self {
            schema_store,
            entity_store,
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    async fn schema(&self, tenant: &str, table: &str) -> CrudlyResult<TableSchema> {
        resolve_schema(self.schema_store.as_ref(), tenant, table).await
    }

    pub async fn get_entity(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<Entity> {
        self.schema(tenant, table).await?;

        self.entity_store
            .fetch(tenant, table, id)
            .await?
            .ok_or_else(|| not_found(table, id))
    }

    /// Validate, plan and run a listing
    ///
    /// The total count and the page are fetched concurrently; the first
    /// failure cancels the other.
    pub async fn get_entities(
        &self,
        tenant: &str,
        table: &str,
        filter: &RawEntityFilter,
        order: &[OrderEntry],
        pagination: PaginationParams,
    ) -> CrudlyResult<EntityPage> {
        let schema = self.schema(tenant, table).await?;
        let filter = validate_entity_filter(filter, &schema)?;
        let order = validate_and_normalize_order(order, &schema)?;
        let plan = build_query_plan(&filter, &order, pagination);

        tracing::debug!(
            tenant = %tenant,
            table = %table,
            predicates = plan.predicates.len(),
            limit = plan.limit,
            offset = plan.offset,
            "listing entities"
        );

        let (total_count, entities) = tokio::try_join!(
            self.entity_store.count(tenant, table, &plan.predicates),
            self.entity_store.query(tenant, table, &plan),
        )?;

        Ok(EntityPage {
            entities,
            total_count,
            limit: plan.limit,
            offset: plan.offset,
        })
    }

    /// [`get_entities`](Self::get_entities) from query-string parameters
    pub async fn list_entities(
        &self,
        tenant: &str,
        table: &str,
        params: &QueryParams,
    ) -> CrudlyResult<EntityPage> {
        let filter = params.entity_filter()?;
        let order = params.entity_order()?;
        let pagination = params.pagination(&self.pagination);

        self.get_entities(tenant, table, &filter, &order, pagination)
            .await
    }

    pub async fn count_entities(
        &self,
        tenant: &str,
        table: &str,
        filter: &RawEntityFilter,
    ) -> CrudlyResult<u64> {
        let schema = self.schema(tenant, table).await?;
        let filter = validate_entity_filter(filter, &schema)?;

        self.entity_store
            .count(tenant, table, &predicates_from_filter(&filter))
            .await
    }

    /// Create an entity under a fresh id
    pub async fn create_entity(
        &self,
        tenant: &str,
        table: &str,
        raw: &RawEntity,
    ) -> CrudlyResult<Entity> {
        self.create_entity_with_id(tenant, table, Uuid::new_v4(), raw)
            .await
    }

    pub async fn create_entity_with_id(
        &self,
        tenant: &str,
        table: &str,
        id: Uuid,
        raw: &RawEntity,
    ) -> CrudlyResult<Entity> {
        let schema = self.schema(tenant, table).await?;
        let entity = with_id(validate_entity(raw, &schema)?, id);

        self.entity_store
            .insert(tenant, table, &schema, id, entity.clone())
            .await?;

        tracing::debug!(tenant = %tenant, table = %table, id = %id, "entity created");
        Ok(entity)
    }

    /// Create a batch of entities, all or none
    ///
    /// Every payload is validated before anything is written; the first
    /// failure is reported with its position in `raws`.
    pub async fn create_entities(
        &self,
        tenant: &str,
        table: &str,
        raws: &[RawEntity],
    ) -> CrudlyResult<Vec<Entity>> {
        let schema = self.schema(tenant, table).await?;

        let rows = raws
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let id = Uuid::new_v4();
                validate_entity(raw, &schema)
                    .map(|entity| (id, with_id(entity, id)))
                    .map_err(|err| err.at_index(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let entities: Vec<Entity> = rows.iter().map(|(_, entity)| entity.clone()).collect();

        self.entity_store
            .insert_many(tenant, table, &schema, rows)
            .await?;

        tracing::debug!(
            tenant = %tenant,
            table = %table,
            count = entities.len(),
            "entities created"
        );
        Ok(entities)
    }

    /// Apply a partial update and return the full entity
    pub async fn update_entity(
        &self,
        tenant: &str,
        table: &str,
        id: Uuid,
        raw: &RawEntity,
    ) -> CrudlyResult<Entity> {
        let schema = self.schema(tenant, table).await?;
        let patch = validate_partial_entity(raw, &schema)?;

        let entity = self
            .entity_store
            .update(tenant, table, &schema, id, &patch)
            .await?
            .ok_or_else(|| not_found(table, id))?;

        tracing::debug!(tenant = %tenant, table = %table, id = %id, "entity updated");
        Ok(entity)
    }

    pub async fn delete_entity(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<()> {
        self.schema(tenant, table).await?;

        if !self.entity_store.delete(tenant, table, id).await? {
            return Err(not_found(table, id));
        }

        tracing::debug!(tenant = %tenant, table = %table, id = %id, "entity deleted");
        Ok(())
    }
}

fn with_id(mut entity: Entity, id: Uuid) -> Entity {
    entity.insert(ID_FIELD.to_string(), Field::Id(id));
    entity
}

fn not_found(table: &str, id: Uuid) -> CrudlyError {
    EntityError::NotFound {
        table: table.to_string(),
        id,
    }
    .into()
}
