//! Shared test harness for service and storage testing
//!
//! Provides a `users` table fixture wired to an [`InMemoryStore`], payload
//! helpers, [`FailingSchemaStore`], a schema store whose atomic units fail
//! at a chosen step so rollback can be observed, and [`SlowSchemaStore`],
//! which widens the gap between reading a schema and writing a row.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod harness;
//! use harness::*;
//! ```

#![allow(dead_code)]

pub mod store_contract;

use async_trait::async_trait;
use crudly::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub const TENANT: &str = "acme";
pub const USERS: &str = "users";

/// `name` (required string), `age` (optional integer), `status` (optional
/// enum), `joined` (optional time) and `verified` (optional boolean)
pub fn users_schema() -> TableSchema {
    TableSchema::new()
        .with_field("name", FieldDefinition::required(FieldType::String))
        .with_field("age", FieldDefinition::optional(FieldType::Integer))
        .with_field(
            "status",
            FieldDefinition::enumeration(["active", "banned"]).into_optional(),
        )
        .with_field("joined", FieldDefinition::optional(FieldType::Time))
        .with_field("verified", FieldDefinition::optional(FieldType::Boolean))
}

/// Turn a `json!` object into a raw payload
pub fn raw(value: Value) -> RawEntity {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Parse `filter=` expressions the way a query string would carry them
pub fn filter(expressions: &[&str]) -> RawEntityFilter {
    QueryParams::from_pairs(expressions.iter().map(|e| ("filter", *e)))
        .and_then(|params| params.entity_filter())
        .expect("filter expressions parse")
}

pub fn names(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .map(|entity| entity["name"].to_string())
        .collect()
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub tables: TableService,
    pub entities: EntityService,
}

impl Fixture {
    /// Insert one `{name, age}` user and return it
    pub async fn user(&self, name: &str, age: i64) -> Entity {
        self.entities
            .create_entity(TENANT, USERS, &raw(serde_json::json!({"name": name, "age": age})))
            .await
            .expect("user is valid")
    }
}

/// Fresh store with an empty `users` table for [`TENANT`]
pub async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let tables = TableService::new(store.clone());
    let entities = EntityService::new(store.clone(), store.clone());

    tables
        .create_table(TENANT, USERS, users_schema())
        .await
        .expect("users schema is valid");

    Fixture {
        store,
        tables,
        entities,
    }
}

// ---------------------------------------------------------------------------
// FailingSchemaStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    AlterColumns,
    PersistSchema,
    Commit,
}

/// Delegates to an [`InMemoryStore`], but every unit fails at `fail_at`
pub struct FailingSchemaStore {
    pub inner: Arc<InMemoryStore>,
    pub fail_at: FailAt,
}

fn injected(step: &str) -> CrudlyError {
    StorageError::Transaction {
        message: format!("injected failure in {}", step),
    }
    .into()
}

#[async_trait]
impl SchemaStore for FailingSchemaStore {
    async fn create_table(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
    ) -> CrudlyResult<()> {
        self.inner.create_table(tenant, table, schema).await
    }

    async fn fetch_schema(&self, tenant: &str, table: &str) -> CrudlyResult<Option<TableSchema>> {
        self.inner.fetch_schema(tenant, table).await
    }

    async fn list_schemas(&self, tenant: &str) -> CrudlyResult<BTreeMap<String, TableSchema>> {
        self.inner.list_schemas(tenant).await
    }

    async fn drop_table(&self, tenant: &str, table: &str) -> CrudlyResult<bool> {
        self.inner.drop_table(tenant, table).await
    }

    async fn begin(
        &self,
        tenant: &str,
        table: &str,
    ) -> CrudlyResult<Option<Box<dyn SchemaTransaction>>> {
        let Some(inner) = self.inner.begin(tenant, table).await? else {
            return Ok(None);
        };
        Ok(Some(Box::new(FailingTransaction {
            inner,
            fail_at: self.fail_at,
        })))
    }
}

struct FailingTransaction {
    inner: Box<dyn SchemaTransaction>,
    fail_at: FailAt,
}

#[async_trait]
impl SchemaTransaction for FailingTransaction {
    fn schema(&self) -> &TableSchema {
        self.inner.schema()
    }

    async fn alter_columns(&mut self, change: &ColumnChange) -> CrudlyResult<()> {
        if self.fail_at == FailAt::AlterColumns {
            return Err(injected("alter_columns"));
        }
        self.inner.alter_columns(change).await
    }

    async fn persist_schema(&mut self, schema: &TableSchema) -> CrudlyResult<()> {
        if self.fail_at == FailAt::PersistSchema {
            return Err(injected("persist_schema"));
        }
        self.inner.persist_schema(schema).await
    }

    async fn commit(self: Box<Self>) -> CrudlyResult<()> {
        if self.fail_at == FailAt::Commit {
            return Err(injected("commit"));
        }
        self.inner.commit().await
    }
}

// ---------------------------------------------------------------------------
// SlowSchemaStore
// ---------------------------------------------------------------------------

/// Delegates to an [`InMemoryStore`], sleeping for `delay` after every
/// schema read
pub struct SlowSchemaStore {
    pub inner: Arc<InMemoryStore>,
    pub delay: Duration,
}

#[async_trait]
impl SchemaStore for SlowSchemaStore {
    async fn create_table(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
    ) -> CrudlyResult<()> {
        self.inner.create_table(tenant, table, schema).await
    }

    async fn fetch_schema(&self, tenant: &str, table: &str) -> CrudlyResult<Option<TableSchema>> {
        let schema = self.inner.fetch_schema(tenant, table).await?;
        tokio::time::sleep(self.delay).await;
        Ok(schema)
    }

    async fn list_schemas(&self, tenant: &str) -> CrudlyResult<BTreeMap<String, TableSchema>> {
        self.inner.list_schemas(tenant).await
    }

    async fn drop_table(&self, tenant: &str, table: &str) -> CrudlyResult<bool> {
        self.inner.drop_table(tenant, table).await
    }

    async fn begin(
        &self,
        tenant: &str,
        table: &str,
    ) -> CrudlyResult<Option<Box<dyn SchemaTransaction>>> {
        self.inner.begin(tenant, table).await
    }
}
