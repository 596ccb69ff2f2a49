//! Storage collaborator traits
//!
//! The engine never talks to a database directly. It validates input, builds
//! a [`QueryPlan`] or a [`ColumnChange`], and hands it to one of these traits.
//! Tenant and table names are opaque strings here.

use crate::core::entity::{Entity, PartialEntity};
use crate::core::error::CrudlyResult;
use crate::core::field::{Field, FieldDefinition, FieldName};
use crate::core::plan::{Predicate, QueryPlan};
use crate::core::schema::TableSchema;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Row-shape change applied inside a [`SchemaTransaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Add a column; existing rows get `default` (or stay unset when `None`)
    Add {
        name: FieldName,
        definition: FieldDefinition,
        default: Option<Field>,
    },
    /// Drop a column from every row
    Drop { name: FieldName },
}

/// Table metadata storage
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Create an empty table; fails with `TableError::AlreadyExists`
    async fn create_table(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
    ) -> CrudlyResult<()>;

    async fn fetch_schema(&self, tenant: &str, table: &str) -> CrudlyResult<Option<TableSchema>>;

    async fn list_schemas(&self, tenant: &str) -> CrudlyResult<BTreeMap<String, TableSchema>>;

    /// Drop a table and its rows; returns whether it existed
    async fn drop_table(&self, tenant: &str, table: &str) -> CrudlyResult<bool>;

    /// Open an atomic unit of work on one table
    ///
    /// Units on the same table never interleave. Returns `None` when the table
    /// does not exist.
    async fn begin(
        &self,
        tenant: &str,
        table: &str,
    ) -> CrudlyResult<Option<Box<dyn SchemaTransaction>>>;
}

/// An atomic unit covering row shape and schema metadata of one table
///
/// Nothing is visible to readers until [`commit`](Self::commit). Dropping the
/// unit without committing rolls every staged change back.
#[async_trait]
pub trait SchemaTransaction: Send {
    /// The schema as seen inside this unit
    fn schema(&self) -> &TableSchema;

    async fn alter_columns(&mut self, change: &ColumnChange) -> CrudlyResult<()>;

    async fn persist_schema(&mut self, schema: &TableSchema) -> CrudlyResult<()>;

    async fn commit(self: Box<Self>) -> CrudlyResult<()>;
}

/// Entity row storage
///
/// Writes carry the schema their rows were validated against. A backend must
/// compare it with the stored schema under the same lock or transaction as the
/// write, and fail with `TableError::SchemaChanged` when a schema change has
/// committed in between.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert one row; fails with `EntityError::AlreadyExists` on an id clash
    async fn insert(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        id: Uuid,
        entity: Entity,
    ) -> CrudlyResult<()>;

    /// Insert all rows or none
    async fn insert_many(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        rows: Vec<(Uuid, Entity)>,
    ) -> CrudlyResult<()>;

    /// Fetch one row, id included
    async fn fetch(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<Option<Entity>>;

    /// Apply a patch and return the full updated row
    async fn update(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        id: Uuid,
        patch: &PartialEntity,
    ) -> CrudlyResult<Option<Entity>>;

    /// Delete a row; returns whether it existed
    async fn delete(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<bool>;

    async fn query(&self, tenant: &str, table: &str, plan: &QueryPlan) -> CrudlyResult<Vec<Entity>>;

    async fn count(&self, tenant: &str, table: &str, predicates: &[Predicate]) -> CrudlyResult<u64>;
}

/// Windowed per-tenant call counters
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Increment and return the count; the window starts on the first call
    async fn increment(&self, tenant: &str, window: Duration) -> CrudlyResult<u64>;

    /// Count in the current window, zero once it has expired
    async fn current_count(&self, tenant: &str) -> CrudlyResult<u64>;
}

/// Per-tenant configured daily limits
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn daily_limit(&self, tenant: &str) -> CrudlyResult<Option<u64>>;

    async fn set_daily_limit(&self, tenant: &str, limit: u64) -> CrudlyResult<()>;
}
