//! SQL statement building over a pluggable connection.
//!
//! [`SqlMapper`] never talks to a database itself. It renders parameterised
//! statements (`?` placeholders, backtick-quoted identifiers) and hands them
//! to a [`Connection`], reads to the reader and writes to the writer, so a
//! primary/replica split is a matter of passing two connections.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::filter::{Filter, Operator};
use super::mapper::{Mapper, Relation, Relations};
use super::query::Query;
use super::sort::{Join, JoinKind};
use crate::error::{Error, Result};
use crate::model::{Model, Schema};

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// What a write reported back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub rows_affected: u64,
    pub last_insert_id: Option<Value>,
}

/// A database driver. Implementations map unique-constraint violations to
/// [`Error::Conflict`] and other failures to [`Error::Database`].
#[async_trait]
pub trait Connection: Send + Sync {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Map<String, Value>>>;

    async fn execute(&self, statement: &Statement) -> Result<Execution>;
}

pub struct SqlMapper {
    table: String,
    schema: Arc<Schema>,
    primary_key: String,
    joins: Vec<Join>,
    reader: Arc<dyn Connection>,
    writer: Arc<dyn Connection>,
    relations: Relations,
}

impl SqlMapper {
    /// Reads and writes both go through `connection` until
    /// [`with_reader`](SqlMapper::with_reader) splits them.
    pub fn new(table: &str, schema: Arc<Schema>, connection: Arc<dyn Connection>) -> Self {
        Self {
            table: table.to_owned(),
            schema,
            primary_key: "id".to_owned(),
            joins: Vec::new(),
            reader: Arc::clone(&connection),
            writer: connection,
            relations: Relations::default(),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn Connection>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_primary_key(mut self, name: &str) -> Self {
        self.primary_key = name.to_owned();
        self
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_relation(mut self, name: &str, relation: Arc<dyn Relation>) -> Self {
        self.relations.insert(name, relation);
        self
    }

    // ── Statement builders ────────────────────────────────────────────────────

    pub fn select(&self, query: &Query) -> Statement {
        let mut sql = self.select_from();
        let mut params = Vec::new();
        self.push_where(&query.filters, &mut sql, &mut params);

        if !query.sorts.is_empty() {
            let order: Vec<String> = query.sorts.iter()
                .map(|s| format!("{} {}", self.column(&s.property), s.direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(page) = query.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::from(page.limit()));
            params.push(Value::from(page.offset()));
        }
        Statement { sql, params }
    }

    pub fn select_by_id(&self, id: &str) -> Statement {
        let sql = format!("{} WHERE {} = ? LIMIT 1", self.select_from(), self.column(&self.primary_key));
        Statement { sql, params: vec![Value::String(id.to_owned())] }
    }

    pub fn count_statement(&self, filters: &[Filter]) -> Statement {
        let mut sql = format!("SELECT COUNT(*) AS `count` FROM {}", quote(&self.table));
        self.push_joins(&mut sql);
        let mut params = Vec::new();
        self.push_where(filters, &mut sql, &mut params);
        Statement { sql, params }
    }

    /// Inserts every stored property; a null primary key is left to the database.
    pub fn insert_statement(&self, model: &Model) -> Statement {
        let (columns, params): (Vec<String>, Vec<Value>) = model.properties().iter()
            .filter(|(name, value)| {
                self.is_column(name) && !(*name == &self.primary_key && value.is_null())
            })
            .map(|(name, value)| (quote(name), value.clone()))
            .unzip();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(&self.table),
            columns.join(", "),
        );
        Statement { sql, params }
    }

    /// `None` when nothing stored has changed.
    pub fn update_statement(&self, model: &Model) -> Result<Option<Statement>> {
        let id = model.get_raw(&self.primary_key)?.clone();
        if id.is_null() {
            return Err(Error::Validation(format!("`{}` is required to update", self.primary_key)));
        }
        let (assignments, mut params): (Vec<String>, Vec<Value>) = model.modified().iter()
            .filter(|(name, _)| self.is_column(name) && **name != self.primary_key)
            .map(|(name, value)| (format!("{} = ?", quote(name)), value.clone()))
            .unzip();
        if assignments.is_empty() {
            return Ok(None);
        }
        params.push(id);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(&self.table),
            assignments.join(", "),
            quote(&self.primary_key),
        );
        Ok(Some(Statement { sql, params }))
    }

    pub fn delete_statement(&self, id: &str) -> Statement {
        let sql = format!("DELETE FROM {} WHERE {} = ?", quote(&self.table), quote(&self.primary_key));
        Statement { sql, params: vec![Value::String(id.to_owned())] }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn select_from(&self) -> String {
        let mut columns = vec![format!("{}.*", quote(&self.table))];
        for join in &self.joins {
            for (column, alias) in &join.columns {
                columns.push(format!("{}.{} AS {}", quote(&join.table), quote(column), quote(alias)));
            }
        }
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), quote(&self.table));
        self.push_joins(&mut sql);
        sql
    }

    fn push_joins(&self, sql: &mut String) {
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(
                " {kind} {} ON {}.{} = {}.{}",
                quote(&join.table),
                quote(&self.table),
                quote(&join.local),
                quote(&join.table),
                quote(&join.foreign),
            ));
        }
    }

    fn push_where(&self, filters: &[Filter], sql: &mut String, params: &mut Vec<Value>) {
        if filters.is_empty() {
            return;
        }
        let clauses: Vec<String> = filters.iter()
            .map(|f| self.condition(f, params))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    fn condition(&self, filter: &Filter, params: &mut Vec<Value>) -> String {
        let column = self.column(filter.property());
        let values = filter.values();
        params.extend(values.iter().cloned());
        let list = || vec!["?"; values.len()].join(", ");
        match filter.operator() {
            Operator::Eq      => format!("{column} = ?"),
            Operator::Ne      => format!("{column} <> ?"),
            Operator::Gt      => format!("{column} > ?"),
            Operator::Gte     => format!("{column} >= ?"),
            Operator::Lt      => format!("{column} < ?"),
            Operator::Lte     => format!("{column} <= ?"),
            Operator::Like    => format!("{column} LIKE ?"),
            Operator::NotLike => format!("{column} NOT LIKE ?"),
            Operator::In      => format!("{column} IN ({})", list()),
            Operator::NotIn   => format!("{column} NOT IN ({})", list()),
            Operator::Between => format!("{column} BETWEEN ? AND ?"),
            Operator::IsNull  => format!("{column} IS NULL"),
            Operator::NotNull => format!("{column} IS NOT NULL"),
        }
    }

    /// Qualified column for a property, looking through joins first.
    fn column(&self, property: &str) -> String {
        for join in &self.joins {
            if let Some(column) = join.column_for(property) {
                return format!("{}.{}", quote(&join.table), quote(column));
            }
        }
        format!("{}.{}", quote(&self.table), quote(property))
    }

    /// A property backed by a column of this table.
    fn is_column(&self, name: &str) -> bool {
        !self.schema.is_computed(name) && !self.joins.iter().any(|j| j.column_for(name).is_some())
    }
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

#[async_trait]
impl Mapper for SqlMapper {
    fn create_model(&self) -> Model {
        Model::new(&self.schema)
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    async fn get(&self, id: &str) -> Result<Option<Model>> {
        let rows = self.reader.fetch_all(&self.select_by_id(id)).await?;
        Ok(rows.into_iter().next().map(|row| Model::load(&self.schema, row)))
    }

    async fn find(&self, query: &Query) -> Result<Vec<Model>> {
        let statement = self.select(query);
        debug!(sql = %statement.sql, "find");
        let rows = self.reader.fetch_all(&statement).await?;
        Ok(rows.into_iter().map(|row| Model::load(&self.schema, row)).collect())
    }

    async fn count(&self, filters: &[Filter]) -> Result<u64> {
        let rows = self.reader.fetch_all(&self.count_statement(filters)).await?;
        let count = match rows.first().and_then(|row| row.get("count")) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        count.ok_or_else(|| Error::Database(format!("COUNT on `{}` returned no number", self.table)))
    }

    async fn insert(&self, model: &mut Model) -> Result<()> {
        let execution = self.writer.execute(&self.insert_statement(model)).await?;
        if model.get_raw(&self.primary_key)?.is_null() {
            if let Some(id) = execution.last_insert_id {
                model.set_raw(&self.primary_key, id)?;
            }
        }
        model.clear_modified();
        Ok(())
    }

    async fn update(&self, model: &mut Model) -> Result<()> {
        if let Some(statement) = self.update_statement(model)? {
            self.writer.execute(&statement).await?;
        }
        model.clear_modified();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let execution = self.writer.execute(&self.delete_statement(id)).await?;
        Ok(execution.rows_affected > 0)
    }

    fn relation(&self, name: &str) -> Option<Arc<dyn Relation>> {
        self.relations.get(name)
    }
}
