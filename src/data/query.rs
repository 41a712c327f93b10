//! Query-string translation into filters, sorts and pagination.
//!
//! | Query string | Meaning |
//! |---|---|
//! | `filter[status]=active` | `status = 'active'` |
//! | `filter[age][gte]=18` | `age >= 18` |
//! | `age[lt]=65` | `age < 65` |
//! | `id[in]=1,2,3` or `id[in][]=1&id[in][]=2` | `id IN (1, 2, 3)` |
//! | `age[between]=18,65` | `age BETWEEN 18 AND 65` |
//! | `filter[deleted_at][isnull]` | `deleted_at IS NULL` |
//! | `order=-created,name` (or `sort=`) | `created DESC, name ASC` |
//! | `page=2&pageSize=50` | second page of 50 |
//!
//! Values are typed on the way in: `null`, `true`/`false`, integers and
//! floats become JSON scalars, everything else stays a string.

use serde::Serialize;
use serde_json::Value;

use super::filter::{Filter, FilterError, Operator};
use super::sort::Sort;
use crate::config::RestConfig;
use crate::error::{Error, Result};
use crate::request::Request;

/// A page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// `page` and `page_size` are clamped to at least 1.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page: page.max(1), page_size: page_size.max(1) }
    }

    /// Rows skipped before this page. Saturates instead of overflowing.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    /// Number of pages needed for `count` records.
    pub fn pages(&self, count: u64) -> u64 {
        count.div_ceil(self.page_size)
    }
}

/// Everything a mapper needs to select a list of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
    pub page: Option<Pagination>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn paginate(mut self, page: Pagination) -> Self {
        self.page = Some(page);
        self
    }

    /// Translates a request's query string.
    ///
    /// The result is always paginated: `page` defaults to 1 and the page size
    /// to `rest.page_size`; a requested `pageSize` is capped at
    /// `rest.max_page_size`.
    pub fn from_request(req: &Request, rest: &RestConfig) -> Result<Self> {
        let mut query = Query::new();
        let mut pending: Vec<PendingFilter> = Vec::new();
        let mut page = 1;
        let mut page_size = None;

        for (key, value) in req.query_pairs() {
            match key.as_str() {
                "page" => page = positive("page", value)?,
                "pageSize" | "page_size" => page_size = Some(positive("pageSize", value)?),
                "order" | "sort" => {
                    query.sorts.extend(value.split(',').filter_map(Sort::parse));
                }
                _ => {
                    if let Some((property, operator, list)) = filter_key(key) {
                        collect(&mut pending, property, operator, list, value);
                    }
                }
            }
        }

        for p in pending {
            query.filters.push(p.build()?);
        }

        let page_size = page_size
            .map(|n| n.min(rest.max_page_size))
            .unwrap_or(rest.page_size);
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(Error::Validation(format!("`page` {page} is out of range")));
        }
        query.page = Some(Pagination::new(page, page_size));
        Ok(query)
    }
}

struct PendingFilter {
    property: String,
    operator: String,
    list: bool,
    values: Vec<String>,
}

impl PendingFilter {
    fn build(self) -> Result<Filter, FilterError> {
        let operator: Operator = self.operator.parse().map_err(|operator| {
            FilterError::UnknownOperator { property: self.property.clone(), operator }
        })?;

        let value = if operator.takes_no_value() {
            Value::Null
        } else if operator.takes_list() {
            let items: Vec<Value> = if self.list {
                self.values.iter().map(|v| scalar(v)).collect()
            } else {
                self.values.iter().flat_map(|v| v.split(',')).map(|v| scalar(v.trim())).collect()
            };
            Value::Array(items)
        } else if self.list {
            Value::Array(self.values.iter().map(|v| scalar(v)).collect())
        } else {
            self.values.first().map(|v| scalar(v)).unwrap_or(Value::Null)
        };

        // `filter[x]=null` reads naturally as a null check.
        let operator = match (operator, &value) {
            (Operator::Eq, Value::Null) => Operator::IsNull,
            (Operator::Ne, Value::Null) => Operator::NotNull,
            (op, _) => op,
        };
        Filter::new(&self.property, operator, value)
    }
}

fn collect(pending: &mut Vec<PendingFilter>, property: String, operator: String, list: bool, value: &str) {
    if list {
        let existing = pending.iter_mut()
            .find(|p| p.list && p.property == property && p.operator == operator);
        if let Some(p) = existing {
            p.values.push(value.to_owned());
            return;
        }
    }
    pending.push(PendingFilter { property, operator, list, values: vec![value.to_owned()] });
}

/// Recognises filter keys and returns `(property, operator, is_list)`.
fn filter_key(key: &str) -> Option<(String, String, bool)> {
    let (base, groups) = split_brackets(key)?;
    let found = match (base, groups.as_slice()) {
        ("filter", [property]) => (property, "eq", false),
        ("filter", [property, ""]) => (property, "in", true),
        ("filter", [property, op]) => (property, *op, false),
        ("filter", [property, op, ""]) => (property, *op, true),
        (_, [""]) => (&base, "in", true),
        (_, [op]) => (&base, *op, false),
        (_, [op, ""]) => (&base, *op, true),
        _ => return None,
    };
    let (property, operator, list) = found;
    if property.is_empty() || operator.is_empty() {
        return None;
    }
    Some((property.to_string(), operator.to_owned(), list))
}

/// `a[b][c]` → `("a", ["b", "c"])`. Anything not of that shape is `None`.
fn split_brackets(key: &str) -> Option<(&str, Vec<&str>)> {
    let open = key.find('[')?;
    let (base, mut rest) = key.split_at(open);
    if base.is_empty() {
        return None;
    }
    let mut groups = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        groups.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    Some((base, groups))
}

fn scalar(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }
    Value::String(raw.to_owned())
}

fn positive(name: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Validation(format!("`{name}` must be a positive integer, got `{raw}`"))),
    }
}
