//! Typed error handling for crudly
//!
//! Every failure the engine can report is a variant of one of the category
//! enums below, wrapped in [`CrudlyError`]. Callers branch on the kind instead
//! of parsing messages, and a boundary layer can turn any error into an HTTP
//! response through [`IntoResponse`].
//!
//! # Error Categories
//!
//! - [`ValidationError`]: schema, entity, filter and order validation
//! - [`EvolutionError`]: adding and deleting fields on an existing table
//! - [`EntityError`]: entity lookups and inserts
//! - [`TableError`]: table lookups and creation
//! - [`StorageError`]: failures reported by a storage collaborator
//! - [`RequestError`]: malformed query-string expressions and admission
//!
//! # Example
//!
//! ```rust,ignore
//! match service.get_entities("tenant", "users", filter, order, page).await {
//!     Ok(page) => println!("{} of {}", page.entities.len(), page.total_count),
//!     Err(CrudlyError::Validation(ValidationError::UnknownField { field })) => {
//!         println!("no such field: {}", field);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use crate::core::field::FieldType;
use crate::core::query::FilterOperator;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for crudly
#[derive(Debug, Error)]
pub enum CrudlyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Evolution(#[from] EvolutionError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// Should not happen in normal operation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CrudlyError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudlyError::Validation(_) => StatusCode::BAD_REQUEST,
            CrudlyError::Evolution(e) => e.status_code(),
            CrudlyError::Entity(e) => e.status_code(),
            CrudlyError::Table(e) => e.status_code(),
            CrudlyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrudlyError::Request(e) => e.status_code(),
            CrudlyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudlyError::Validation(e) => e.error_code(),
            CrudlyError::Evolution(e) => e.error_code(),
            CrudlyError::Entity(e) => e.error_code(),
            CrudlyError::Table(e) => e.error_code(),
            CrudlyError::Storage(_) => "STORAGE_ERROR",
            CrudlyError::Request(e) => e.error_code(),
            CrudlyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CrudlyError::Validation(e) => {
                e.field().map(|field| serde_json::json!({ "field": field }))
            }
            CrudlyError::Evolution(EvolutionError::MissingDefaultValue { field })
            | CrudlyError::Evolution(EvolutionError::FieldAlreadyExists { field })
            | CrudlyError::Evolution(EvolutionError::FieldNotFound { field }) => {
                Some(serde_json::json!({ "field": field }))
            }
            CrudlyError::Entity(EntityError::NotFound { table, id })
            | CrudlyError::Entity(EntityError::AlreadyExists { table, id }) => {
                Some(serde_json::json!({
                    "table": table,
                    "id": id.to_string()
                }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for CrudlyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for CrudlyError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CrudlyError>() {
            Ok(crudly_err) => crudly_err,
            Err(other) => CrudlyError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CrudlyError {
    fn from(err: serde_json::Error) -> Self {
        CrudlyError::Internal(format!("JSON error: {}", err))
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors produced by the schema, entity, filter and order validators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("table schema is not valid: field '{field}': {reason}")]
    InvalidSchema { field: String, reason: String },

    #[error("field '{field}' does not exist in table schema")]
    UnknownField { field: String },

    #[error("entity is missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' is not a valid {expected}")]
    FieldTypeMismatch { field: String, expected: FieldType },

    #[error("field '{field}' has value '{value}' which is not one of: {}", .allowed.join(", "))]
    EnumValueInvalid {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("field name '{field}' is reserved")]
    ReservedFieldName { field: String },

    #[error("filter '{operator}' is not valid for field '{field}' of type '{field_type}'")]
    UnsupportedOperator {
        field: String,
        operator: FilterOperator,
        field_type: FieldType,
    },

    #[error("filter comparator '{comparator}' is not valid for field '{field}'")]
    InvalidComparator { field: String, comparator: String },

    #[error("field '{field}' of type '{field_type}' cannot be ordered")]
    UnsupportedOrder { field: String, field_type: FieldType },

    #[error("entity at index {index}: {source}")]
    AtIndex {
        index: usize,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidSchema { field, .. }
            | ValidationError::UnknownField { field }
            | ValidationError::MissingField { field }
            | ValidationError::FieldTypeMismatch { field, .. }
            | ValidationError::EnumValueInvalid { field, .. }
            | ValidationError::ReservedFieldName { field }
            | ValidationError::UnsupportedOperator { field, .. }
            | ValidationError::InvalidComparator { field, .. }
            | ValidationError::UnsupportedOrder { field, .. } => Some(field),
            ValidationError::AtIndex { source, .. } => source.field(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::InvalidSchema { .. } => "INVALID_SCHEMA",
            ValidationError::UnknownField { .. } => "UNKNOWN_FIELD",
            ValidationError::MissingField { .. } => "MISSING_FIELD",
            ValidationError::FieldTypeMismatch { .. } => "FIELD_TYPE_MISMATCH",
            ValidationError::EnumValueInvalid { .. } => "ENUM_VALUE_INVALID",
            ValidationError::ReservedFieldName { .. } => "RESERVED_FIELD_NAME",
            ValidationError::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            ValidationError::InvalidComparator { .. } => "INVALID_COMPARATOR",
            ValidationError::UnsupportedOrder { .. } => "UNSUPPORTED_ORDER",
            ValidationError::AtIndex { source, .. } => source.error_code(),
        }
    }

    /// Tag this error with the position of the entity in a batch
    pub fn at_index(self, index: usize) -> Self {
        ValidationError::AtIndex {
            index,
            source: Box::new(self),
        }
    }
}

// =============================================================================
// Schema Evolution Errors
// =============================================================================

/// Errors raised while adding or deleting a field
#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("field '{field}' is not optional and needs a default value")]
    MissingDefaultValue { field: String },

    #[error("default value is not valid: {0}")]
    InvalidDefaultValue(#[source] ValidationError),

    #[error("field '{field}' already exists")]
    FieldAlreadyExists { field: String },

    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// The atomic unit failed and was fully rolled back
    #[error("schema change on table '{table}' was rolled back: {source}")]
    Conflict {
        table: String,
        #[source]
        source: Box<CrudlyError>,
    },
}

impl EvolutionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EvolutionError::MissingDefaultValue { .. }
            | EvolutionError::InvalidDefaultValue(_)
            | EvolutionError::FieldAlreadyExists { .. } => StatusCode::BAD_REQUEST,
            EvolutionError::FieldNotFound { .. } => StatusCode::NOT_FOUND,
            EvolutionError::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EvolutionError::MissingDefaultValue { .. } => "MISSING_DEFAULT_VALUE",
            EvolutionError::InvalidDefaultValue(_) => "INVALID_DEFAULT_VALUE",
            EvolutionError::FieldAlreadyExists { .. } => "FIELD_ALREADY_EXISTS",
            EvolutionError::FieldNotFound { .. } => "FIELD_NOT_FOUND",
            EvolutionError::Conflict { .. } => "SCHEMA_EVOLUTION_CONFLICT",
        }
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity '{id}' not found in table '{table}'")]
    NotFound { table: String, id: Uuid },

    #[error("entity '{id}' already exists in table '{table}'")]
    AlreadyExists { table: String, id: Uuid },
}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::AlreadyExists { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
            EntityError::AlreadyExists { .. } => "ENTITY_ALREADY_EXISTS",
        }
    }
}

// =============================================================================
// Table Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table '{table}' not found")]
    NotFound { table: String },

    #[error("table '{table}' already exists")]
    AlreadyExists { table: String },

    /// A schema change committed between validation and the write
    #[error("schema of table '{table}' changed during the write")]
    SchemaChanged { table: String },
}

impl TableError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TableError::NotFound { .. } => StatusCode::NOT_FOUND,
            TableError::AlreadyExists { .. } | TableError::SchemaChanged { .. } => {
                StatusCode::CONFLICT
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            TableError::NotFound { .. } => "TABLE_NOT_FOUND",
            TableError::AlreadyExists { .. } => "TABLE_ALREADY_EXISTS",
            TableError::SchemaChanged { .. } => "TABLE_SCHEMA_CHANGED",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors reported by storage collaborators
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors in query-string expressions and request admission
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid filter '{expression}': {reason}")]
    InvalidFilter { expression: String, reason: String },

    #[error("field '{field}' is filtered more than once")]
    DuplicateFilter { field: String },

    #[error("invalid order '{expression}': {reason}")]
    InvalidOrder { expression: String, reason: String },

    #[error("{parameter} must be a non-negative integer, got '{value}'")]
    InvalidPagination { parameter: String, value: String },

    #[error("tenant '{tenant}' has exceeded its daily call limit")]
    RateLimited { tenant: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidFilter { .. } => "INVALID_FILTER",
            RequestError::DuplicateFilter { .. } => "DUPLICATE_FILTER",
            RequestError::InvalidOrder { .. } => "INVALID_ORDER",
            RequestError::InvalidPagination { .. } => "INVALID_PAGINATION",
            RequestError::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}

/// A specialized Result type for crudly operations
pub type CrudlyResult<T> = Result<T, CrudlyError>;
