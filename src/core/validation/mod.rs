//! Schema-driven validation
//!
//! Pure functions over immutable inputs: each takes raw caller input plus a
//! [`TableSchema`](crate::core::schema::TableSchema) and returns the typed
//! value or the first [`ValidationError`](crate::core::error::ValidationError).

pub mod coerce;
pub mod entity;
pub mod filters;
pub mod order;

pub use crate::core::schema::validate_table_schema;
pub use coerce::{coerce_comparator, coerce_value};
pub use entity::{validate_entity, validate_partial_entity};
pub use filters::validate_entity_filter;
pub use order::validate_and_normalize_order;
