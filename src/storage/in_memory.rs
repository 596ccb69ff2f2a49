//! In-memory implementation of every storage trait, for testing and development

use crate::core::entity::{Entity, PartialEntity, apply_patch};
use crate::core::error::{CrudlyError, CrudlyResult, EntityError, StorageError, TableError};
use crate::core::plan::{Predicate, QueryPlan};
use crate::core::schema::TableSchema;
use crate::core::store::{
    ColumnChange, EntityStore, RateLimitStore, SchemaStore, SchemaTransaction, UsageStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

const BACKEND: &str = "in-memory";

#[derive(Debug, Clone)]
struct TableState {
    schema: TableSchema,
    rows: BTreeMap<Uuid, Entity>,
}

impl TableState {
    /// Rows may only be written in the shape they were validated against
    fn check_schema(&self, table: &str, validated: &TableSchema) -> CrudlyResult<()> {
        if self.schema != *validated {
            return Err(TableError::SchemaChanged {
                table: table.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

type SharedTable = Arc<AsyncMutex<TableState>>;

#[derive(Debug, Clone, Copy)]
struct UsageWindow {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory store
///
/// Tables are keyed by tenant and name. Each table sits behind its own async
/// mutex, which a [`SchemaTransaction`] holds until it commits or is dropped;
/// readers of that table wait and never observe a half-applied change.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<(String, String), SharedTable>>>,
    usage: Arc<Mutex<HashMap<String, UsageWindow>>>,
    limits: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, tenant: &str, table: &str) -> CrudlyResult<Option<SharedTable>> {
        let tables = self.tables.read().map_err(lock_failed)?;
        Ok(tables
            .get(&(tenant.to_string(), table.to_string()))
            .cloned())
    }

    fn existing_table(&self, tenant: &str, table: &str) -> CrudlyResult<SharedTable> {
        self.table(tenant, table)?.ok_or_else(|| {
            TableError::NotFound {
                table: table.to_string(),
            }
            .into()
        })
    }
}

fn lock_failed<T>(err: PoisonError<T>) -> CrudlyError {
    StorageError::Backend {
        backend: BACKEND.to_string(),
        message: format!("Failed to acquire lock: {}", err),
    }
    .into()
}

#[async_trait]
impl SchemaStore for InMemoryStore {
    async fn create_table(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
    ) -> CrudlyResult<()> {
        let mut tables = self.tables.write().map_err(lock_failed)?;

        let key = (tenant.to_string(), table.to_string());
        if tables.contains_key(&key) {
            return Err(TableError::AlreadyExists {
                table: table.to_string(),
            }
            .into());
        }

        tables.insert(
            key,
            Arc::new(AsyncMutex::new(TableState {
                schema: schema.clone(),
                rows: BTreeMap::new(),
            })),
        );

        Ok(())
    }

    async fn fetch_schema(&self, tenant: &str, table: &str) -> CrudlyResult<Option<TableSchema>> {
        let Some(state) = self.table(tenant, table)? else {
            return Ok(None);
        };
        let schema = state.lock().await.schema.clone();
        Ok(Some(schema))
    }

    async fn list_schemas(&self, tenant: &str) -> CrudlyResult<BTreeMap<String, TableSchema>> {
        // Collect handles first; the std guard cannot be held across an await
        let handles: Vec<(String, SharedTable)> = {
            let tables = self.tables.read().map_err(lock_failed)?;
            tables
                .iter()
                .filter(|((owner, _), _)| owner == tenant)
                .map(|((_, name), state)| (name.clone(), state.clone()))
                .collect()
        };

        let mut schemas = BTreeMap::new();
        for (name, state) in handles {
            schemas.insert(name, state.lock().await.schema.clone());
        }
        Ok(schemas)
    }

    async fn drop_table(&self, tenant: &str, table: &str) -> CrudlyResult<bool> {
        let mut tables = self.tables.write().map_err(lock_failed)?;
        Ok(tables
            .remove(&(tenant.to_string(), table.to_string()))
            .is_some())
    }

    async fn begin(
        &self,
        tenant: &str,
        table: &str,
    ) -> CrudlyResult<Option<Box<dyn SchemaTransaction>>> {
        let Some(state) = self.table(tenant, table)? else {
            return Ok(None);
        };

        let guard = state.lock_owned().await;
        let staged = TableState::clone(&guard);
        Ok(Some(Box::new(InMemoryTransaction { guard, staged })))
    }
}

/// Works on a copy of the table; commit swaps it in under the held lock
struct InMemoryTransaction {
    guard: OwnedMutexGuard<TableState>,
    staged: TableState,
}

#[async_trait]
impl SchemaTransaction for InMemoryTransaction {
    fn schema(&self) -> &TableSchema {
        &self.staged.schema
    }

    async fn alter_columns(&mut self, change: &ColumnChange) -> CrudlyResult<()> {
        match change {
            ColumnChange::Add { name, default, .. } => {
                if let Some(default) = default {
                    for row in self.staged.rows.values_mut() {
                        row.insert(name.clone(), default.clone());
                    }
                }
            }
            ColumnChange::Drop { name } => {
                for row in self.staged.rows.values_mut() {
                    row.remove(name);
                }
            }
        }
        Ok(())
    }

    async fn persist_schema(&mut self, schema: &TableSchema) -> CrudlyResult<()> {
        self.staged.schema = schema.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CrudlyResult<()> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        id: Uuid,
        entity: Entity,
    ) -> CrudlyResult<()> {
        let state = self.existing_table(tenant, table)?;
        let mut state = state.lock().await;
        state.check_schema(table, schema)?;

        if state.rows.contains_key(&id) {
            return Err(EntityError::AlreadyExists {
                table: table.to_string(),
                id,
            }
            .into());
        }

        state.rows.insert(id, entity);
        Ok(())
    }

    async fn insert_many(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        rows: Vec<(Uuid, Entity)>,
    ) -> CrudlyResult<()> {
        let state = self.existing_table(tenant, table)?;
        let mut state = state.lock().await;
        state.check_schema(table, schema)?;

        let mut seen = HashSet::new();
        for (id, _) in &rows {
            if state.rows.contains_key(id) || !seen.insert(*id) {
                return Err(EntityError::AlreadyExists {
                    table: table.to_string(),
                    id: *id,
                }
                .into());
            }
        }

        state.rows.extend(rows);
        Ok(())
    }

    async fn fetch(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<Option<Entity>> {
        let state = self.existing_table(tenant, table)?;
        let state = state.lock().await;
        Ok(state.rows.get(&id).cloned())
    }

    async fn update(
        &self,
        tenant: &str,
        table: &str,
        schema: &TableSchema,
        id: Uuid,
        patch: &PartialEntity,
    ) -> CrudlyResult<Option<Entity>> {
        let state = self.existing_table(tenant, table)?;
        let mut state = state.lock().await;
        state.check_schema(table, schema)?;

        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };
        apply_patch(row, patch);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, tenant: &str, table: &str, id: Uuid) -> CrudlyResult<bool> {
        let state = self.existing_table(tenant, table)?;
        let mut state = state.lock().await;
        Ok(state.rows.remove(&id).is_some())
    }

    async fn query(
        &self,
        tenant: &str,
        table: &str,
        plan: &QueryPlan,
    ) -> CrudlyResult<Vec<Entity>> {
        let state = self.existing_table(tenant, table)?;
        let state = state.lock().await;

        let mut matching: Vec<&Entity> = state
            .rows
            .values()
            .filter(|row| plan.matches(row))
            .collect();
        matching.sort_by(|a, b| plan.compare(a, b));

        Ok(matching
            .into_iter()
            .skip(usize::try_from(plan.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(plan.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        tenant: &str,
        table: &str,
        predicates: &[Predicate],
    ) -> CrudlyResult<u64> {
        let state = self.existing_table(tenant, table)?;
        let state = state.lock().await;

        let count = state
            .rows
            .values()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn increment(&self, tenant: &str, window: Duration) -> CrudlyResult<u64> {
        let window = chrono::Duration::from_std(window).map_err(|e| StorageError::Backend {
            backend: BACKEND.to_string(),
            message: format!("invalid usage window: {}", e),
        })?;
        let now = Utc::now();

        let mut usage = self.usage.lock().map_err(lock_failed)?;
        let entry = usage.entry(tenant.to_string()).or_insert(UsageWindow {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            *entry = UsageWindow {
                count: 0,
                expires_at: now + window,
            };
        }

        entry.count += 1;
        Ok(entry.count)
    }

    async fn current_count(&self, tenant: &str) -> CrudlyResult<u64> {
        let usage = self.usage.lock().map_err(lock_failed)?;
        Ok(usage
            .get(tenant)
            .filter(|window| window.expires_at > Utc::now())
            .map_or(0, |window| window.count))
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn daily_limit(&self, tenant: &str) -> CrudlyResult<Option<u64>> {
        let limits = self.limits.read().map_err(lock_failed)?;
        Ok(limits.get(tenant).copied())
    }

    async fn set_daily_limit(&self, tenant: &str, limit: u64) -> CrudlyResult<()> {
        let mut limits = self.limits.write().map_err(lock_failed)?;
        limits.insert(tenant.to_string(), limit);
        Ok(())
    }
}
