//! A REST actor over any [`Mapper`].
//!
//! A repository answers only the `Index` action that [`App::resource`]
//! routes to. The HTTP method and the number of positional params pick the
//! operation:
//!
//! | Request | Operation |
//! |---|---|
//! | `GET /users` | list, filtered, sorted and paginated |
//! | `HEAD` on any `GET` path | the `GET` status and headers, no body |
//! | `GET /users/5` | fetch one |
//! | `GET /users/5/orders` | list the `Orders` relation of user 5 |
//! | `POST /users` | create, `201` |
//! | `PUT /users/5` | replace; properties missing from the body reset to defaults |
//! | `PATCH /users/5` | partial update |
//! | `DELETE /users/5` | delete, `204` |
//!
//! [`App::resource`]: crate::App::resource

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::actor::Actor;
use crate::config::RestConfig;
use crate::data::{Mapper, Query};
use crate::error::{Error, Result};
use crate::method::Method;
use crate::model::Model;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::{DEFAULT_NAME, capitalize};

use super::reply::Reply;

pub struct Repository<M> {
    mapper: Arc<M>,
    rest: RestConfig,
}

impl<M: Mapper> Repository<M> {
    pub fn new(mapper: Arc<M>) -> Self {
        Self { mapper, rest: RestConfig::default() }
    }

    /// Overrides the default and maximum page sizes.
    pub fn with_config(mut self, rest: RestConfig) -> Self {
        self.rest = rest;
        self
    }

    pub fn mapper(&self) -> &Arc<M> {
        &self.mapper
    }

    /// Runs the operation the request's method and params select.
    pub async fn dispatch(&self, req: &Request) -> Result<Reply> {
        match (req.method(), req.args()) {
            (Method::Get | Method::Head, []) => self.list(req).await,
            (Method::Get | Method::Head, [id]) => self.show(id).await,
            (Method::Get | Method::Head, [id, name]) => self.related(id, name, req).await,
            (Method::Post, []) => self.create(req).await,
            (Method::Put, [id]) => self.replace(id, req).await,
            (Method::Patch, [id]) => self.modify(id, req).await,
            (Method::Delete, [id]) => self.remove(id).await,
            (_, args) if args.len() > 2 => {
                Err(Error::NotFound(format!("no resource at {}", req.path())))
            }
            (method, _) => Err(Error::MethodNotAllowed(method.to_string())),
        }
    }

    async fn list(&self, req: &Request) -> Result<Reply> {
        let query = Query::from_request(req, &self.rest)?;
        let blank = self.mapper.create_model();
        check_properties(&query, |name| blank.has(name))?;

        let count = self.mapper.count(&query.filters).await?;
        let models = self.mapper.find(&query).await?;
        Ok(page_reply(models, &query, count))
    }

    async fn show(&self, id: &str) -> Result<Reply> {
        Ok(Reply::ok(self.load(id).await?))
    }

    async fn related(&self, id: &str, name: &str, req: &Request) -> Result<Reply> {
        let name = capitalize(name);
        let relation = self.mapper.relation(&name)
            .ok_or_else(|| Error::NotFound(format!("no relation `{name}`")))?;
        self.load(id).await?;

        let query = Query::from_request(req, &self.rest)?;
        let known = relation.properties();
        check_properties(&query, |p| known.iter().any(|k| k == p))?;

        let count = relation.count(id, &query.filters).await?;
        let models = relation.fetch(id, &query).await?;
        Ok(page_reply(models, &query, count))
    }

    async fn create(&self, req: &Request) -> Result<Reply> {
        let body = object_body(req)?;
        let mut model = self.mapper.create_model();
        model.fill(body)?;
        self.mapper.insert(&mut model).await?;
        debug!(id = %model.get_raw(self.mapper.primary_key())?, "created");
        Ok(Reply::created(model))
    }

    async fn replace(&self, id: &str, req: &Request) -> Result<Reply> {
        let mut body = object_body(req)?;
        let mut model = self.load(id).await?;
        body.remove(self.mapper.primary_key());

        let schema = Arc::clone(model.schema());
        let mut values = Map::new();
        for name in schema.names() {
            if name == self.mapper.primary_key() || schema.is_computed(name) {
                continue;
            }
            if let Some(default) = schema.default_of(name) {
                values.insert(name.to_owned(), default.clone());
            }
        }
        values.extend(body);

        model.fill(values)?;
        self.mapper.update(&mut model).await?;
        Ok(Reply::ok(model))
    }

    async fn modify(&self, id: &str, req: &Request) -> Result<Reply> {
        let mut body = object_body(req)?;
        let mut model = self.load(id).await?;
        body.remove(self.mapper.primary_key());

        model.fill(body)?;
        self.mapper.update(&mut model).await?;
        Ok(Reply::ok(model))
    }

    async fn remove(&self, id: &str) -> Result<Reply> {
        if self.mapper.delete(id).await? {
            Ok(Reply::no_content())
        } else {
            Err(not_found(id))
        }
    }

    async fn load(&self, id: &str) -> Result<Model> {
        self.mapper.get(id).await?.ok_or_else(|| not_found(id))
    }
}

#[async_trait]
impl<M: Mapper> Actor for Repository<M> {
    /// Convention paths such as `/users/2` name `2` as the action, which
    /// would shift the params CRUD dispatch counts, so they are refused.
    fn handles(&self, action: &str) -> bool {
        action == DEFAULT_NAME
    }

    async fn call(&self, _action: &str, req: Request) -> Response {
        let res = self.dispatch(&req).await.into_response();
        // HEAD answers with the headers a GET would produce and no body.
        if req.method() == Method::Head {
            return res.without_body();
        }
        res
    }
}

fn not_found(id: &str) -> Error {
    Error::NotFound(format!("no record with id {id}"))
}

fn page_reply(models: Vec<Model>, query: &Query, count: u64) -> Reply {
    match query.page {
        Some(page) => Reply::page(models, page, count),
        None => Reply::ok(models).with_meta("count", Value::from(count)),
    }
}

fn object_body(req: &Request) -> Result<Map<String, Value>> {
    match req.json::<Value>()? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation("request body must be a JSON object".to_owned())),
    }
}

/// Rejects filters and sorts on properties the target does not declare.
fn check_properties(query: &Query, known: impl Fn(&str) -> bool) -> Result<()> {
    let names = query.filters.iter()
        .map(|f| f.property())
        .chain(query.sorts.iter().map(|s| s.property.as_str()));
    for name in names {
        if !known(name) {
            return Err(Error::Validation(format!("unknown property `{name}`")));
        }
    }
    Ok(())
}
