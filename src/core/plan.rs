//! Storage-agnostic query plans
//!
//! A [`QueryPlan`] is what a storage backend receives for a read. It carries
//! typed predicates, sort keys and pagination, but no query syntax; turning it
//! into SQL (or anything else) is the backend's job.

use crate::core::entity::Entity;
use crate::core::field::{Field, FieldName};
use crate::core::query::{
    EntityFilter, FilterOperator, OrderEntry, PaginationParams, SortDirection,
};
use serde::Serialize;
use std::cmp::Ordering;

/// `field <operator> value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub field: FieldName,
    pub operator: FilterOperator,
    pub value: Field,
}

impl Predicate {
    /// Evaluate against an entity; an unset field never matches
    pub fn matches(&self, entity: &Entity) -> bool {
        let Some(actual) = entity.get(&self.field) else {
            return false;
        };
        let Some(ordering) = actual.compare(&self.value) else {
            return false;
        };

        match self.operator {
            FilterOperator::Eq => ordering == Ordering::Equal,
            FilterOperator::Gt => ordering == Ordering::Greater,
            FilterOperator::Gte => ordering != Ordering::Less,
            FilterOperator::Lt => ordering == Ordering::Less,
            FilterOperator::Lte => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: FieldName,
    pub direction: SortDirection,
}

impl SortKey {
    /// Compare two entities on this key; unset values sort first
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let ordering = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub limit: u64,
    pub offset: u64,
}

impl QueryPlan {
    /// Whether `entity` satisfies every predicate
    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicates.iter().all(|p| p.matches(entity))
    }

    /// Lexicographic comparison over the sort keys
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Turn a validated filter into predicates
pub fn predicates_from_filter(filter: &EntityFilter) -> Vec<Predicate> {
    filter
        .iter()
        .map(|(field, filter)| Predicate {
            field: field.clone(),
            operator: filter.operator,
            value: filter.comparator.clone(),
        })
        .collect()
}

/// Compose a validated filter, a normalized order and pagination
///
/// No validation happens here.
pub fn build_query_plan(
    filter: &EntityFilter,
    order: &[OrderEntry],
    pagination: PaginationParams,
) -> QueryPlan {
    QueryPlan {
        predicates: predicates_from_filter(filter),
        sort: order
            .iter()
            .map(|entry| SortKey {
                field: entry.field.clone(),
                direction: entry.direction,
            })
            .collect(),
        limit: pagination.limit,
        offset: pagination.offset,
    }
}
