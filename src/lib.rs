//! # Crudly
//!
//! A schema-driven type, validation and query-planning engine for
//! multi-tenant entity tables.
//!
//! ## Features
//!
//! - **Closed Field Types**: id, integer, string, boolean, time and enum values
//! - **Schema Validation**: table schemas, full entities and partial updates
//! - **Typed Filters and Orders**: comparators coerced per field type, with a
//!   deterministic `id` tiebreaker appended to every order
//! - **Storage-Agnostic Plans**: backends receive a [`core::QueryPlan`], not SQL
//! - **Atomic Schema Evolution**: add or delete fields with back-fill in one unit
//! - **Usage Accounting**: fire-and-forget per-tenant counters with daily limits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crudly::prelude::*;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let tables = TableService::new(store.clone());
//! let entities = EntityService::new(store.clone(), store.clone());
//!
//! tables
//!     .create_table(
//!         "acme",
//!         "users",
//!         TableSchema::new()
//!             .with_field("name", FieldDefinition::required(FieldType::String))
//!             .with_field("age", FieldDefinition::optional(FieldType::Integer)),
//!     )
//!     .await?;
//!
//! let alice = serde_json::json!({"name": "Alice", "age": 30});
//! entities
//!     .create_entity("acme", "users", alice.as_object().unwrap())
//!     .await?;
//!
//! let params = QueryParams::from_pairs([("filter", "age>=18"), ("order", "name|desc")])?;
//! let page = entities.list_entities("acme", "users", &params).await?;
//! ```

pub mod config;
pub mod core;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Types ===
    pub use crate::core::{
        entity::{Entity, PartialEntity, RawEntity},
        field::{Field, FieldDefinition, FieldName, FieldType},
        plan::{Predicate, QueryPlan, SortKey, build_query_plan},
        query::{
            EntityFilter, EntityOrder, EntityPage, FilterOperator, OrderEntry, PaginationParams,
            QueryParams, RawEntityFilter, RawFieldFilter, SortDirection,
        },
        schema::{ID_FIELD, TableSchema},
    };

    // === Validation ===
    pub use crate::core::validation::{
        validate_and_normalize_order, validate_entity, validate_entity_filter,
        validate_partial_entity, validate_table_schema,
    };

    // === Errors ===
    pub use crate::core::error::{
        CrudlyError, CrudlyResult, EntityError, EvolutionError, RequestError, StorageError,
        TableError, ValidationError,
    };

    // === Services ===
    pub use crate::core::{
        evolution::SchemaEvolutionManager,
        service::{EntityService, TableService},
        usage::UsageTracker,
    };

    // === Storage ===
    pub use crate::core::store::{
        ColumnChange, EntityStore, RateLimitStore, SchemaStore, SchemaTransaction, UsageStore,
    };
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;

    // === Config ===
    pub use crate::config::{CrudlyConfig, PaginationConfig, RateLimitConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
