//! Filter, order and pagination parameters
//!
//! Raw filters and orders come from the query string and are checked against
//! a table schema by [`crate::core::validation`] before a plan is built.
//!
//! # Grammar
//!
//! ```text
//! GET /tables/users/entities?filter=age>=18&filter=status=open&order=name|desc&limit=10
//! ```
//!
//! - `filter=<field><op><comparator>`, `<op>` one of `=`, `>`, `>=`, `<`, `<=`.
//!   The operator is the first `<`, `>` or `=` in the expression, so field
//!   names cannot contain those characters. Each field may be filtered once.
//! - `order=<field>` (ascending), `order=<field>|asc` or `order=<field>|desc`.
//!   Repeated parameters are applied in the order given.
//! - `limit` and `offset` are non-negative integers.

use crate::config::PaginationConfig;
use crate::core::entity::Entity;
use crate::core::error::RequestError;
use crate::core::field::{Field, FieldName};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Default page size
pub const DEFAULT_LIMIT: u64 = 20;

/// Comparison applied by a field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 5] = [
        FilterOperator::Eq,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
        }
    }

    pub fn parse(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == symbol)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter as written by the caller, comparator not yet typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFieldFilter {
    pub operator: FilterOperator,
    pub comparator: String,
}

impl RawFieldFilter {
    pub fn new(operator: FilterOperator, comparator: impl Into<String>) -> Self {
        Self {
            operator,
            comparator: comparator.into(),
        }
    }
}

/// A filter whose comparator has been coerced to the field's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub operator: FilterOperator,
    pub comparator: Field,
}

pub type RawEntityFilter = BTreeMap<FieldName, RawFieldFilter>;

pub type EntityFilter = BTreeMap<FieldName, FieldFilter>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sort key; position in an [`EntityOrder`] gives its precedence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub field: FieldName,
    pub direction: SortDirection,
}

impl OrderEntry {
    pub fn new(field: impl Into<FieldName>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<FieldName>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<FieldName>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

pub type EntityOrder = Vec<OrderEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: u64,
    pub offset: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PaginationParams {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// Query parameters for listing entities
///
/// Deserializable from a JSON body; [`QueryParams::from_pairs`] handles the
/// repeated `filter`/`order` keys of a URL query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub filter: Vec<String>,
    pub order: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryParams {
    /// Collect parameters from decoded query-string pairs
    ///
    /// Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "filter" => params.filter.push(value.to_string()),
                "order" => params.order.push(value.to_string()),
                "limit" => params.limit = Some(parse_non_negative("limit", value)?),
                "offset" => params.offset = Some(parse_non_negative("offset", value)?),
                _ => {}
            }
        }

        Ok(params)
    }

    pub fn entity_filter(&self) -> Result<RawEntityFilter, RequestError> {
        let mut filter = RawEntityFilter::new();

        for expression in &self.filter {
            let (field, field_filter) = parse_filter_expression(expression)?;
            if filter.contains_key(&field) {
                return Err(RequestError::DuplicateFilter { field });
            }
            filter.insert(field, field_filter);
        }

        Ok(filter)
    }

    pub fn entity_order(&self) -> Result<EntityOrder, RequestError> {
        self.order
            .iter()
            .map(|expression| parse_order_expression(expression))
            .collect()
    }

    /// Resolve pagination against configured defaults and caps
    pub fn pagination(&self, config: &PaginationConfig) -> PaginationParams {
        let mut limit = self.limit.unwrap_or(config.default_limit);
        if let Some(max) = config.max_limit {
            limit = limit.min(max);
        }

        PaginationParams {
            limit,
            offset: self.offset.unwrap_or(0),
        }
    }
}

fn parse_non_negative(parameter: &str, value: &str) -> Result<u64, RequestError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| RequestError::InvalidPagination {
            parameter: parameter.to_string(),
            value: value.to_string(),
        })
}

fn filter_regex() -> &'static Regex {
    static FILTER_REGEX: OnceLock<Regex> = OnceLock::new();
    FILTER_REGEX.get_or_init(|| {
        Regex::new(r"^([^<>=]+)(>=|<=|>|<|=)(.*)$").expect("filter grammar regex is valid")
    })
}

/// Parse one `<field><op><comparator>` expression
pub fn parse_filter_expression(
    expression: &str,
) -> Result<(FieldName, RawFieldFilter), RequestError> {
    let captures = filter_regex()
        .captures(expression)
        .ok_or_else(|| RequestError::InvalidFilter {
            expression: expression.to_string(),
            reason: "expected <field><operator><value>".to_string(),
        })?;

    let field = captures[1].trim();
    if field.is_empty() {
        return Err(RequestError::InvalidFilter {
            expression: expression.to_string(),
            reason: "missing field name".to_string(),
        });
    }

    let operator =
        FilterOperator::parse(&captures[2]).ok_or_else(|| RequestError::InvalidFilter {
            expression: expression.to_string(),
            reason: format!("unknown operator '{}'", &captures[2]),
        })?;

    Ok((
        field.to_string(),
        RawFieldFilter::new(operator, &captures[3]),
    ))
}

/// Parse one `<field>[|asc|desc]` expression
pub fn parse_order_expression(expression: &str) -> Result<OrderEntry, RequestError> {
    let invalid = |reason: &str| RequestError::InvalidOrder {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = expression.split('|');
    let field = parts.next().unwrap_or_default().trim();
    if field.is_empty() {
        return Err(invalid("missing field name"));
    }

    let direction = match parts.next().map(str::trim) {
        None | Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        Some(_) => return Err(invalid("direction must be 'asc' or 'desc'")),
    };

    if parts.next().is_some() {
        return Err(invalid("expected <field>|<direction>"));
    }

    Ok(OrderEntry::new(field, direction))
}

/// One page of entities plus the total number matching the filter
#[derive(Debug, Clone, Serialize)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub total_count: u64,
    pub limit: u64,
    pub offset: u64,
}
