//! Sort and join clauses.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::filter::compare;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(property: &str) -> Self {
        Self { property: property.to_owned(), direction: Direction::Asc }
    }

    pub fn desc(property: &str) -> Self {
        Self { property: property.to_owned(), direction: Direction::Desc }
    }

    /// Parses one `order` token: `-name` descending, `name` or `+name` ascending.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (direction, property) = match token.strip_prefix('-') {
            Some(rest) => (Direction::Desc, rest),
            None => (Direction::Asc, token.strip_prefix('+').unwrap_or(token)),
        };
        if property.is_empty() {
            return None;
        }
        Some(Self { property: property.to_owned(), direction })
    }
}

/// Orders two rows by a list of sorts. Nulls sort first ascending.
pub(crate) fn compare_rows(a: &Map<String, Value>, b: &Map<String, Value>, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let left = a.get(&sort.property).unwrap_or(&Value::Null);
        let right = b.get(&sort.property).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
        };
        let ord = match sort.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

/// A join onto another table, exposing some of its columns as properties.
///
/// `columns` pairs a column of the joined table with the property name it
/// appears under, so `("total", "order_total")` selects
/// `orders.total AS order_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub local: String,
    pub foreign: String,
    #[serde(default)]
    pub columns: Vec<(String, String)>,
}

impl Join {
    pub fn new(kind: JoinKind, table: &str, local: &str, foreign: &str) -> Self {
        Self {
            kind,
            table: table.to_owned(),
            local: local.to_owned(),
            foreign: foreign.to_owned(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: &str, alias: &str) -> Self {
        self.columns.push((column.to_owned(), alias.to_owned()));
        self
    }

    /// The joined column behind `property`, if this join provides it.
    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.columns.iter()
            .find(|(_, alias)| alias == property)
            .map(|(column, _)| column.as_str())
    }
}
