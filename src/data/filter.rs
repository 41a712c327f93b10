//! Typed filter expressions.
//!
//! A [`Filter`] pairs a property with an [`Operator`] and a value whose shape
//! the operator dictates. The shape is checked whenever the filter is built or
//! changed, so a `Filter` in hand is always well formed.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    IsNull,
    NotNull,
}

impl Operator {
    /// The query-string token, e.g. `gte`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq      => "eq",
            Self::Ne      => "ne",
            Self::Gt      => "gt",
            Self::Gte     => "gte",
            Self::Lt      => "lt",
            Self::Lte     => "lte",
            Self::Like    => "like",
            Self::NotLike => "notlike",
            Self::In      => "in",
            Self::NotIn   => "notin",
            Self::Between => "between",
            Self::IsNull  => "isnull",
            Self::NotNull => "notnull",
        }
    }

    /// `In`, `NotIn` and `Between` take a list of values.
    pub fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between)
    }

    /// `IsNull` and `NotNull` take no value at all.
    pub fn takes_no_value(self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }
}

/// Accepts the canonical tokens plus the usual aliases (`neq`, `ge`, `nin`, ...).
impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" | "="                => Ok(Self::Eq),
            "ne" | "neq" | "!="       => Ok(Self::Ne),
            "gt" | ">"                => Ok(Self::Gt),
            "gte" | "ge" | ">="       => Ok(Self::Gte),
            "lt" | "<"                => Ok(Self::Lt),
            "lte" | "le" | "<="       => Ok(Self::Lte),
            "like"                    => Ok(Self::Like),
            "notlike" | "nlike"       => Ok(Self::NotLike),
            "in"                      => Ok(Self::In),
            "notin" | "nin"           => Ok(Self::NotIn),
            "between"                 => Ok(Self::Between),
            "isnull" | "null"         => Ok(Self::IsNull),
            "notnull" | "isnotnull"   => Ok(Self::NotNull),
            other                     => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("`{property}`: operator `{operator}` requires a list of values")]
    ExpectedList { property: String, operator: Operator },

    #[error("`{property}`: operator `{operator}` requires exactly two values")]
    ExpectedPair { property: String, operator: Operator },

    #[error("`{property}`: operator `{operator}` requires a single scalar value")]
    ExpectedScalar { property: String, operator: Operator },

    #[error("`{property}`: operator `{operator}` takes no value")]
    ExpectedNull { property: String, operator: Operator },

    #[error("`{property}`: unknown operator `{operator}`")]
    UnknownOperator { property: String, operator: String },
}

impl FilterError {
    pub fn property(&self) -> &str {
        match self {
            Self::ExpectedList { property, .. }
            | Self::ExpectedPair { property, .. }
            | Self::ExpectedScalar { property, .. }
            | Self::ExpectedNull { property, .. }
            | Self::UnknownOperator { property, .. } => property,
        }
    }
}

/// `property <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    property: String,
    operator: Operator,
    value: Value,
}

impl Filter {
    pub fn new(property: &str, operator: Operator, value: Value) -> Result<Self, FilterError> {
        check_shape(property, operator, &value)?;
        Ok(Self { property: property.to_owned(), operator, value })
    }

    pub fn eq(property: &str, value: Value) -> Result<Self, FilterError> {
        Self::new(property, Operator::Eq, value)
    }

    pub fn property(&self) -> &str { &self.property }
    pub fn operator(&self) -> Operator { self.operator }
    pub fn value(&self) -> &Value { &self.value }

    /// The value as a slice: the list for list operators, otherwise one item
    /// (or none for null checks).
    pub fn values(&self) -> &[Value] {
        match &self.value {
            Value::Array(items) => items.as_slice(),
            Value::Null if self.operator.takes_no_value() => &[],
            other => std::slice::from_ref(other),
        }
    }

    /// Replaces the value. Leaves the filter untouched if the shape is wrong.
    pub fn set_value(&mut self, value: Value) -> Result<(), FilterError> {
        check_shape(&self.property, self.operator, &value)?;
        self.value = value;
        Ok(())
    }

    /// Replaces the operator. Fails if the current value does not fit it.
    pub fn set_operator(&mut self, operator: Operator) -> Result<(), FilterError> {
        check_shape(&self.property, operator, &self.value)?;
        self.operator = operator;
        Ok(())
    }

    /// Evaluates the filter against a stored row.
    ///
    /// A missing column compares as null. Numbers compare numerically, so a
    /// filter value of `"5"` parsed to `5` matches a stored `5.0`.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let field = row.get(&self.property).unwrap_or(&Value::Null);
        match self.operator {
            Operator::Eq      => loose_eq(field, &self.value),
            Operator::Ne      => !field.is_null() && !loose_eq(field, &self.value),
            Operator::Gt      => compare(field, &self.value) == Some(Ordering::Greater),
            Operator::Gte     => matches!(compare(field, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Lt      => compare(field, &self.value) == Some(Ordering::Less),
            Operator::Lte     => matches!(compare(field, &self.value), Some(Ordering::Less | Ordering::Equal)),
            Operator::Like    => like(field, &self.value),
            Operator::NotLike => !field.is_null() && !like(field, &self.value),
            Operator::In      => self.values().iter().any(|v| loose_eq(field, v)),
            Operator::NotIn   => !field.is_null() && !self.values().iter().any(|v| loose_eq(field, v)),
            Operator::Between => match self.values() {
                [low, high] => {
                    matches!(compare(field, low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(field, high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            Operator::IsNull  => field.is_null(),
            Operator::NotNull => !field.is_null(),
        }
    }
}

fn check_shape(property: &str, operator: Operator, value: &Value) -> Result<(), FilterError> {
    let property = property.to_owned();
    match operator {
        Operator::IsNull | Operator::NotNull => {
            if !value.is_null() {
                return Err(FilterError::ExpectedNull { property, operator });
            }
        }
        Operator::In | Operator::NotIn => match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(is_scalar) => {}
            _ => return Err(FilterError::ExpectedList { property, operator }),
        },
        Operator::Between => match value {
            Value::Array(items) if items.len() == 2 && items.iter().all(is_scalar) => {}
            _ => return Err(FilterError::ExpectedPair { property, operator }),
        },
        _ => {
            if !is_scalar(value) || value.is_null() {
                return Err(FilterError::ExpectedScalar { property, operator });
            }
        }
    }
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Orders two JSON values when they are comparable.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::String(a), Value::Number(b)) => a.parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_) | Value::String(_))
        | (Value::String(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// SQL `LIKE`: `%` is any run of characters, `_` exactly one. Case-sensitive.
fn like(field: &Value, pattern: &Value) -> bool {
    let (Some(text), Some(pattern)) = (field.as_str(), pattern.as_str()) else {
        return false;
    };
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn in_rejects_non_array_values() {
        let err = Filter::new("status", Operator::In, json!("active")).unwrap_err();
        assert!(matches!(err, FilterError::ExpectedList { .. }));
        assert!(Filter::new("status", Operator::In, json!([])).is_err());
        assert!(Filter::new("status", Operator::In, json!(["a", "b"])).is_ok());
    }

    #[test]
    fn between_requires_exactly_two_values() {
        assert!(Filter::new("age", Operator::Between, json!([1])).is_err());
        assert!(Filter::new("age", Operator::Between, json!([1, 2, 3])).is_err());
        assert!(Filter::new("age", Operator::Between, json!(5)).is_err());
        assert!(Filter::new("age", Operator::Between, json!([18, 65])).is_ok());
    }

    #[test]
    fn scalar_operators_forbid_arrays() {
        let err = Filter::new("age", Operator::Gt, json!([1, 2])).unwrap_err();
        assert!(matches!(err, FilterError::ExpectedScalar { .. }));
        assert!(Filter::new("age", Operator::Eq, Value::Null).is_err());
        assert!(Filter::new("deleted_at", Operator::IsNull, json!(1)).is_err());
    }

    #[test]
    fn failed_mutation_leaves_filter_unchanged() {
        let mut filter = Filter::new("age", Operator::Gt, json!(18)).unwrap();
        assert!(filter.set_operator(Operator::In).is_err());
        assert_eq!(filter.operator(), Operator::Gt);

        assert!(filter.set_value(json!({ "nested": true })).is_err());
        assert_eq!(filter.value(), &json!(18));

        filter.set_value(json!([18, 30])).unwrap_err();
        filter.set_value(json!(21)).unwrap();
        assert_eq!(filter.value(), &json!(21));
    }

    #[test]
    fn operator_aliases_parse() {
        assert_eq!("neq".parse::<Operator>(), Ok(Operator::Ne));
        assert_eq!("GE".parse::<Operator>(), Ok(Operator::Gte));
        assert_eq!("nin".parse::<Operator>(), Ok(Operator::NotIn));
        assert!("near".parse::<Operator>().is_err());
    }

    #[test]
    fn comparisons_are_numeric_aware() {
        let r = row(json!({ "age": 21.0, "name": "Johnson", "deleted_at": null }));
        assert!(Filter::eq("age", json!(21)).unwrap().matches(&r));
        assert!(Filter::new("age", Operator::Gte, json!(21)).unwrap().matches(&r));
        assert!(!Filter::new("age", Operator::Lt, json!(21)).unwrap().matches(&r));
        assert!(Filter::new("age", Operator::Between, json!([18, 21])).unwrap().matches(&r));
        assert!(Filter::new("age", Operator::In, json!([1, 21])).unwrap().matches(&r));
        assert!(Filter::new("deleted_at", Operator::IsNull, Value::Null).unwrap().matches(&r));
        assert!(Filter::new("missing", Operator::IsNull, Value::Null).unwrap().matches(&r));
    }

    #[test]
    fn like_uses_sql_wildcards() {
        let r = row(json!({ "name": "Johnson" }));
        assert!(Filter::new("name", Operator::Like, json!("%son")).unwrap().matches(&r));
        assert!(Filter::new("name", Operator::Like, json!("J_hnson")).unwrap().matches(&r));
        assert!(!Filter::new("name", Operator::Like, json!("john%")).unwrap().matches(&r));
        assert!(Filter::new("name", Operator::NotLike, json!("Smith%")).unwrap().matches(&r));

        let r = row(json!({ "name": "a.b" }));
        assert!(!Filter::new("name", Operator::Like, json!("a_c")).unwrap().matches(&row(json!({ "name": "abd" }))));
        assert!(Filter::new("name", Operator::Like, json!("a.b")).unwrap().matches(&r));
        assert!(!Filter::new("name", Operator::Like, json!("a.b")).unwrap().matches(&row(json!({ "name": "axb" }))));
    }
}
