//! # Queries
//!
//! Filter, sort and limit semantics shared by every backend.
//!
//! ```text
//! Query::new("cash_sessions")
//!     .filter(Filter::eq("user_id", "u1"))
//!     .filter(Filter::gte("open_time", "2024-03-10T03:00:00Z"))
//!     .filter(Filter::lt("open_time", "2024-03-11T03:00:00Z"))
//!     .order_by("open_time", Direction::Desc)
//!     .limit(1)
//! ```
//!
//! Column names are the remote (snake_case) names. Strings that parse as
//! RFC 3339 timestamps compare as instants, so `...:00Z` and `...:00.000+00:00`
//! are equal and fractional precision does not affect ordering.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// One stored record: a JSON object with snake_case keys.
pub type Row = serde_json::Map<String, Value>;

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Neq(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(column.into(), value.into())
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(column.into(), value.into())
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(column.into(), value.into())
    }

    pub fn any_of<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _)
            | Filter::In(c, _) => c,
        }
    }

    /// Missing columns read as `null`. Ordering filters never match `null`.
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, v) => values_equal(actual, v),
            Filter::Neq(_, v) => !values_equal(actual, v),
            Filter::Gt(_, v) => compare_values(actual, v) == Some(Ordering::Greater),
            Filter::Gte(_, v) => matches!(
                compare_values(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(_, v) => compare_values(actual, v) == Some(Ordering::Less),
            Filter::Lte(_, v) => matches!(
                compare_values(actual, v),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(_, vs) => vs.iter().any(|v| values_equal(actual, v)),
        }
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Equality with numeric and timestamp normalization.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::String(_), Value::String(_)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Ordering between two scalar values; `None` when they are not comparable
/// (different types, nulls, arrays, objects).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A select against one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub resource: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(resource: impl Into<String>) -> Self {
        Query {
            resource: resource.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Filters, sorts and truncates rows given in insertion order.
    ///
    /// Sorting is stable; rows whose sort values are not comparable keep
    /// their relative order.
    pub fn apply<I>(&self, rows: I) -> Vec<Row>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut out: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = &self.order {
            out.sort_by(|a, b| {
                let va = a.get(&order.column).unwrap_or(&Value::Null);
                let vb = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare_values(va, vb).unwrap_or(Ordering::Equal);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// A row to insert, optionally guarded by a business uniqueness key.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub resource: String,
    pub row: Row,
    pub unique_key: Option<String>,
}

impl Insert {
    pub fn new(resource: impl Into<String>, row: Row) -> Self {
        Insert {
            resource: resource.into(),
            row,
            unique_key: None,
        }
    }

    pub fn unique_key(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }
}
