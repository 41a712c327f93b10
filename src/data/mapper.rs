//! The data-access seam.
//!
//! A [`Mapper`] turns CRUD calls over [`Model`]s into whatever its backend
//! speaks. A [`Relation`] is a named sub-collection reachable from a parent
//! record, e.g. a user's orders; REST repositories expose it as
//! `/users/{id}/orders`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::filter::Filter;
use super::query::Query;
use crate::error::Result;
use crate::model::Model;

#[async_trait]
pub trait Mapper: Send + Sync + 'static {
    /// A blank model with every declared property at its default.
    fn create_model(&self) -> Model;

    /// Name of the identifying property.
    fn primary_key(&self) -> &str {
        "id"
    }

    async fn get(&self, id: &str) -> Result<Option<Model>>;

    async fn find(&self, query: &Query) -> Result<Vec<Model>>;

    async fn count(&self, filters: &[Filter]) -> Result<u64>;

    /// Persists a new record. The model receives its generated id.
    async fn insert(&self, model: &mut Model) -> Result<()>;

    /// Persists the model's modified properties, then clears them.
    async fn update(&self, model: &mut Model) -> Result<()>;

    /// `true` when a record was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// A named relation, e.g. `"Orders"`.
    fn relation(&self, _name: &str) -> Option<Arc<dyn Relation>> {
        None
    }
}

/// A fetch/count pair over the records belonging to one parent.
#[async_trait]
pub trait Relation: Send + Sync {
    async fn fetch(&self, parent_id: &str, query: &Query) -> Result<Vec<Model>>;

    async fn count(&self, parent_id: &str, filters: &[Filter]) -> Result<u64>;

    /// Properties the related records expose, for validating filters.
    fn properties(&self) -> Vec<String>;
}

/// Children of another mapper whose `foreign_key` equals the parent id.
pub struct HasMany<M> {
    child: Arc<M>,
    foreign_key: String,
}

impl<M: Mapper> HasMany<M> {
    pub fn new(child: Arc<M>, foreign_key: &str) -> Self {
        Self { child, foreign_key: foreign_key.to_owned() }
    }

    fn scoped(&self, parent_id: &str, filters: &[Filter]) -> Result<Vec<Filter>> {
        let mut scoped = Vec::with_capacity(filters.len() + 1);
        scoped.push(Filter::eq(&self.foreign_key, Value::String(parent_id.to_owned()))?);
        scoped.extend_from_slice(filters);
        Ok(scoped)
    }
}

#[async_trait]
impl<M: Mapper> Relation for HasMany<M> {
    async fn fetch(&self, parent_id: &str, query: &Query) -> Result<Vec<Model>> {
        let scoped = Query {
            filters: self.scoped(parent_id, &query.filters)?,
            sorts: query.sorts.clone(),
            page: query.page,
        };
        self.child.find(&scoped).await
    }

    async fn count(&self, parent_id: &str, filters: &[Filter]) -> Result<u64> {
        self.child.count(&self.scoped(parent_id, filters)?).await
    }

    fn properties(&self) -> Vec<String> {
        self.child.create_model().names().map(str::to_owned).collect()
    }
}

/// Named relations, shared by mapper implementations.
#[derive(Default, Clone)]
pub struct Relations {
    by_name: HashMap<String, Arc<dyn Relation>>,
}

impl Relations {
    pub fn insert(&mut self, name: &str, relation: Arc<dyn Relation>) {
        self.by_name.insert(name.to_owned(), relation);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Relation>> {
        self.by_name.get(name).cloned()
    }
}
