//! An in-process mapper over JSON rows.
//!
//! Good for prototypes, demos and tests. Filters, sorts and pagination are
//! evaluated in memory with the same semantics the SQL mapper asks of a
//! database.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::filter::Filter;
use super::mapper::{Mapper, Relation, Relations};
use super::query::Query;
use super::sort::compare_rows;
use crate::error::{Error, Result};
use crate::model::{Model, Schema};

type Row = Map<String, Value>;

pub struct MemoryMapper {
    schema: Arc<Schema>,
    primary_key: String,
    unique: Vec<String>,
    rows: RwLock<Vec<Row>>,
    next_id: AtomicU64,
    relations: Relations,
}

impl MemoryMapper {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            primary_key: "id".to_owned(),
            unique: Vec::new(),
            rows: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            relations: Relations::default(),
        }
    }

    pub fn with_primary_key(mut self, name: &str) -> Self {
        self.primary_key = name.to_owned();
        self
    }

    /// Declares a column whose non-null values must be unique.
    pub fn with_unique(mut self, column: &str) -> Self {
        self.unique.push(column.to_owned());
        self
    }

    pub fn with_relation(mut self, name: &str, relation: Arc<dyn Relation>) -> Self {
        self.relations.insert(name, relation);
        self
    }

    /// Inserts each JSON object as a new record.
    pub async fn seed(&self, records: impl IntoIterator<Item = Value>) -> Result<()> {
        for record in records {
            let Value::Object(values) = record else {
                return Err(Error::Validation("seed records must be JSON objects".to_owned()));
            };
            let mut model = self.create_model();
            model.fill(values)?;
            self.insert(&mut model).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Row>>> {
        self.rows.read().map_err(|_| Error::Database("row lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Row>>> {
        self.rows.write().map_err(|_| Error::Database("row lock poisoned".to_owned()))
    }

    fn id_filter(&self, id: &Value) -> Result<Filter> {
        Ok(Filter::eq(&self.primary_key, id.clone())?)
    }

    /// Columns the store keeps: everything declared that is not computed.
    fn stored(&self, model: &Model) -> Row {
        model.properties().iter()
            .filter(|(name, _)| !self.schema.is_computed(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn check_unique(&self, rows: &[Row], candidate: &Row, skip: Option<usize>) -> Result<()> {
        for column in std::iter::once(&self.primary_key).chain(&self.unique) {
            let value = match candidate.get(column) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let matcher = Filter::eq(column, value.clone())?;
            let clash = rows.iter().enumerate()
                .any(|(i, row)| Some(i) != skip && matcher.matches(row));
            if clash {
                return Err(Error::Conflict(format!("duplicate value for `{column}`")));
            }
        }
        Ok(())
    }
}

/// An explicit id that occupies a slot of the generated sequence: an
/// unsigned number, or a string holding one.
fn numeric_id(id: Option<&Value>) -> Option<u64> {
    match id? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl Mapper for MemoryMapper {
    fn create_model(&self) -> Model {
        Model::new(&self.schema)
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    async fn get(&self, id: &str) -> Result<Option<Model>> {
        let matcher = self.id_filter(&Value::String(id.to_owned()))?;
        let rows = self.read()?;
        Ok(rows.iter()
            .find(|row| matcher.matches(row))
            .map(|row| Model::load(&self.schema, row.clone())))
    }

    async fn find(&self, query: &Query) -> Result<Vec<Model>> {
        let rows = self.read()?;
        let mut matched: Vec<&Row> = rows.iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .collect();
        if !query.sorts.is_empty() {
            matched.sort_by(|a, b| compare_rows(a, b, &query.sorts));
        }
        let (skip, take) = match query.page {
            Some(page) => (page.offset() as usize, page.limit() as usize),
            None => (0, usize::MAX),
        };
        Ok(matched.into_iter()
            .skip(skip)
            .take(take)
            .map(|row| Model::load(&self.schema, row.clone()))
            .collect())
    }

    async fn count(&self, filters: &[Filter]) -> Result<u64> {
        let rows = self.read()?;
        Ok(rows.iter().filter(|row| filters.iter().all(|f| f.matches(row))).count() as u64)
    }

    async fn insert(&self, model: &mut Model) -> Result<()> {
        let mut rows = self.write()?;

        let mut row = self.stored(model);
        let generated = match model.get_raw(&self.primary_key)? {
            Value::Null => {
                let id = self.next_id.load(Ordering::SeqCst);
                row.insert(self.primary_key.clone(), Value::from(id));
                Some(id)
            }
            _ => None,
        };
        self.check_unique(&rows, &row, None)?;

        // The row is accepted from here on. A rejected insert leaves the
        // model and the id sequence untouched.
        if let Some(id) = generated {
            model.set_raw(&self.primary_key, Value::from(id))?;
        }
        if let Some(id) = generated.or_else(|| numeric_id(row.get(&self.primary_key))) {
            self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        }
        rows.push(row);
        model.clear_modified();
        debug!(id = %model.get_raw(&self.primary_key)?, "memory insert");
        Ok(())
    }

    async fn update(&self, model: &mut Model) -> Result<()> {
        let id = model.get_raw(&self.primary_key)?.clone();
        if id.is_null() {
            return Err(Error::Validation(format!("`{}` is required to update", self.primary_key)));
        }
        let matcher = self.id_filter(&id)?;

        let mut rows = self.write()?;
        let index = rows.iter()
            .position(|row| matcher.matches(row))
            .ok_or_else(|| Error::NotFound(format!("no record with {} {id}", self.primary_key)))?;

        let mut updated = rows[index].clone();
        for (name, value) in model.modified() {
            if !self.schema.is_computed(name) {
                updated.insert(name.clone(), value.clone());
            }
        }
        self.check_unique(&rows, &updated, Some(index))?;
        rows[index] = updated;
        model.clear_modified();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let matcher = self.id_filter(&Value::String(id.to_owned()))?;
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|row| !matcher.matches(row));
        Ok(rows.len() != before)
    }

    fn relation(&self, name: &str) -> Option<Arc<dyn Relation>> {
        self.relations.get(name)
    }
}
