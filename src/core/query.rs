//! Query filters, find options and pagination

use crate::core::attributes::{Document, get_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Selection criteria understood by every [`Store`](crate::core::store::Store)
///
/// # Example
/// ```rust,ignore
/// // accepted requests between exactly "1" and "2"
/// Filter::and([
///     Filter::or([
///         Filter::and([Filter::eq("requesting_user_id", "1"), Filter::eq("requested_user_id", "2")]),
///         Filter::and([Filter::eq("requesting_user_id", "2"), Filter::eq("requested_user_id", "1")]),
///     ]),
///     Filter::eq("accepted", true),
/// ])
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    /// Value at a dotted path equals the operand. A null operand also
    /// matches a missing path.
    Eq(String, Value),
    /// Value at a dotted path equals one of the operands
    In(String, Vec<Value>),
    /// Every sub-filter matches
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
    /// Value at a dotted path is of the operand's kind and not less than it
    Gte(String, Value),
    /// Value at a dotted path is of the operand's kind and not greater than it
    Lte(String, Value),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn any_of<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(path.into(), value.into())
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(path.into(), value.into())
    }

    /// Build an `And` of equalities from a flat JSON object
    pub fn from_json(query: &Value) -> Option<Self> {
        let map = query.as_object()?;
        Some(Filter::And(
            map.iter()
                .map(|(path, value)| Filter::Eq(path.clone(), value.clone()))
                .collect(),
        ))
    }

    /// Evaluate the filter against a stored document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => match get_path(document, path) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            },
            Filter::In(path, candidates) => {
                let actual = get_path(document, path).unwrap_or(&Value::Null);
                candidates.iter().any(|candidate| candidate == actual)
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Filter::Gte(path, bound) => {
                compare_same_kind(get_path(document, path), bound).is_some_and(Ordering::is_ge)
            }
            Filter::Lte(path, bound) => {
                compare_same_kind(get_path(document, path), bound).is_some_and(Ordering::is_le)
            }
        }
    }

    /// JSON rendering, used in `NotFound` messages and logs
    pub fn to_json(&self) -> Value {
        match self {
            Filter::All => Value::Object(Default::default()),
            Filter::Eq(path, value) => single(path, value.clone()),
            Filter::In(path, values) => single(path, serde_json::json!({ "$in": values })),
            Filter::And(filters) => {
                serde_json::json!({ "$and": filters.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
            Filter::Or(filters) => {
                serde_json::json!({ "$or": filters.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
            Filter::Gte(path, bound) => single(path, serde_json::json!({ "$gte": bound })),
            Filter::Lte(path, bound) => single(path, serde_json::json!({ "$lte": bound })),
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse `field`, `field:asc` or `field:desc`
    pub fn parse(expr: &str) -> Self {
        match expr.split_once(':') {
            Some((field, "desc")) => Sort::desc(field),
            Some((field, _)) => Sort::asc(field),
            None => Sort::asc(expr),
        }
    }

    /// Compare two documents on this key. Missing values sort first.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(get_path(a, &self.field), get_path(b, &self.field));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Bool(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Ordering of a stored value against a range bound. Values of another
/// kind, null and missing values never compare, as in MongoDB.
fn compare_same_kind(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match (actual?, bound) {
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => Some(compare_values(actual, Some(bound))),
        _ => None,
    }
}

/// Options for [`Store::find_where`](crate::core::store::Store::find_where)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of records per page
    pub limit: Option<usize>,
    /// Page number, starting at 1
    pub page: Option<usize>,
    pub sort: Option<Sort>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Effective page size. A zero limit means no limit.
    pub fn page_size(&self) -> Option<usize> {
        self.limit.filter(|&limit| limit > 0)
    }

    /// Number of records to skip: `(page - 1) * limit`, zero without a
    /// limit. Saturates for page numbers past the end of any collection.
    pub fn skip(&self) -> usize {
        match self.page_size() {
            Some(limit) => (self.page.unwrap_or(1).max(1) - 1).saturating_mul(limit),
            None => 0,
        }
    }

    /// Whether more records follow the requested page
    pub fn has_next_page(&self, total: usize) -> bool {
        self.page_size()
            .is_some_and(|limit| self.skip().saturating_add(limit) < total)
    }
}

/// One page of raw documents returned by a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Document>,
    pub has_next_page: bool,
}
