//! Core module containing the type system, validators and services

pub mod entity;
pub mod error;
pub mod evolution;
pub mod field;
pub mod plan;
pub mod query;
pub mod schema;
pub mod service;
pub mod store;
pub mod usage;
pub mod validation;

pub use entity::{Entity, PartialEntity, RawEntity};
pub use error::{CrudlyError, CrudlyResult};
pub use evolution::SchemaEvolutionManager;
pub use field::{Field, FieldDefinition, FieldName, FieldType};
pub use plan::{QueryPlan, build_query_plan};
pub use query::{
    EntityFilter, EntityOrder, EntityPage, FilterOperator, OrderEntry, PaginationParams,
    QueryParams, RawEntityFilter, RawFieldFilter, SortDirection,
};
pub use schema::{ID_FIELD, TableSchema};
pub use service::{EntityService, TableService};
pub use store::{
    ColumnChange, EntityStore, RateLimitStore, SchemaStore, SchemaTransaction, UsageStore,
};
pub use usage::UsageTracker;
