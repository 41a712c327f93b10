//! The application: direct handlers, routed actors and the middleware
//! pipeline in front of both.
//!
//! A request goes through every middleware stage, then:
//!
//! 1. a direct handler registered with [`App::on`] for its method and path;
//! 2. otherwise the [`Router`] resolves the path to an actor, an action and
//!    positional params, and the actor runs the action.
//!
//! ```rust
//! use std::sync::Arc;
//! use rebar::data::MemoryMapper;
//! use rebar::model::Schema;
//! use rebar::rest::Repository;
//! use rebar::{App, Controller, Method, Request, health};
//! use serde_json::Value;
//!
//! async fn about(_req: Request) -> &'static str { "rebar" }
//!
//! # fn main() -> rebar::Result<()> {
//! let schema = Schema::new().property("id", Value::Null).property("name", Value::Null).build();
//!
//! let app = App::new()
//!     .on(Method::Get, "/healthz", health::liveness)
//!     .actor("Pages", Controller::new().action("About", about))
//!     .resource("/users", "Users", Repository::new(Arc::new(MemoryMapper::new(schema))))?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use matchit::Router as MatchitRouter;
use tracing::warn;

use crate::actor::Actor;
use crate::config::{Config, RestConfig};
use crate::data::Mapper;
use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Endpoint, Middleware, Pipeline};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::rest::Repository;
use crate::router::{DEFAULT_NAME, Resolution, Route, RouteError, Router};

#[derive(Default)]
pub struct App {
    direct: HashMap<Method, MatchitRouter<BoxedHandler>>,
    router: Router,
    actors: HashMap<String, Arc<dyn Actor>>,
    pipeline: Pipeline,
    rest: RestConfig,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// An app seeded with the configured explicit routes and REST settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut app = Self { rest: config.rest, ..Self::default() };
        for route in &config.routes {
            app.router.push(route.clone())?;
        }
        Ok(app)
    }

    /// Registers a direct handler for a method and path. Path parameters use
    /// `{name}` syntax and are read with [`Request::param`].
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.direct
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Registers an actor under `name`, e.g. `"Users"`.
    pub fn actor(mut self, name: &str, actor: impl Actor) -> Self {
        self.actors.insert(name.to_owned(), Arc::new(actor));
        self
    }

    /// Appends an explicit route. Explicit routes are tried in the order
    /// they were added, before the naming convention.
    pub fn route(mut self, route: Route) -> Result<Self> {
        self.router.push(route)?;
        Ok(self)
    }

    /// Mounts a REST repository as actor `name` at `path`.
    pub fn resource<M: Mapper>(self, path: &str, name: &str, repository: Repository<M>) -> Result<Self> {
        self.actor(name, repository).route(Route::new(path, name, DEFAULT_NAME))
    }

    /// A repository over `mapper` using this app's page sizes.
    pub fn repository<M: Mapper>(&self, mapper: Arc<M>) -> Repository<M> {
        Repository::new(mapper).with_config(self.rest)
    }

    /// Appends a middleware stage.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.pipeline.push(middleware);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Resolves `path` to a registered actor that handles the resolved action.
    pub fn resolve(&self, path: &str) -> Result<(Arc<dyn Actor>, Resolution), RouteError> {
        let resolution = self.router.resolve(path);
        let actor = self.actors.get(&resolution.actor)
            .ok_or_else(|| RouteError::ActorNotFound(resolution.actor.clone()))?;
        if !actor.handles(&resolution.action) {
            return Err(RouteError::ActionNotFound {
                actor: resolution.actor,
                action: resolution.action,
            });
        }
        Ok((Arc::clone(actor), resolution))
    }

    /// Runs one request through the middleware and the app.
    pub async fn handle(&self, req: Request) -> Response {
        self.pipeline.run(req, self).await
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self.direct.get(&method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }

    async fn dispatch(&self, mut req: Request) -> Response {
        if let Some((handler, params)) = self.lookup(req.method(), req.path()) {
            req.set_params(params);
            return handler(req).await;
        }

        match self.resolve(req.path()) {
            Ok((actor, resolution)) => {
                req.set_args(resolution.params);
                actor.call(&resolution.action, req).await
            }
            Err(e) => {
                warn!(method = %req.method(), path = req.path(), error = %e, "unroutable request");
                Error::from(e).into_response()
            }
        }
    }
}

#[async_trait]
impl Endpoint for App {
    async fn call(&self, req: Request, res: Response) -> Response {
        let mut out = self.dispatch(req).await;
        out.inherit_headers(res);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Controller;
    use crate::status::Status;
    use serde_json::json;

    async fn show(req: Request) -> String {
        format!("show {}", req.args().join("/"))
    }

    async fn user(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    fn app() -> App {
        App::new()
            .on(Method::Get, "/direct/{id}", user)
            .actor("Users", Controller::new().action("Show", show).action("Index", show))
    }

    #[tokio::test]
    async fn direct_handlers_win() {
        let res = app().handle(Request::new(Method::Get, "/direct/7")).await;
        assert_eq!(res.body(), b"user 7");
    }

    #[tokio::test]
    async fn convention_routes_to_actor_action() {
        let res = app().handle(Request::new(Method::Get, "/users/show/5")).await;
        assert_eq!(res.body(), b"show 5");
    }

    #[tokio::test]
    async fn explicit_route_is_tried_first() {
        let app = app().route(Route::new("/people", "Users", "Show")).unwrap();
        let res = app.handle(Request::new(Method::Get, "/people/3/4")).await;
        assert_eq!(res.body(), b"show 3/4");
    }

    #[tokio::test]
    async fn unknown_actor_and_action_are_not_found() {
        let res = app().handle(Request::new(Method::Get, "/orders")).await;
        assert_eq!(res.status_code(), Status::NotFound);
        assert_eq!(res.json_body().unwrap()["error"]["extra"], json!({ "actor": "Orders" }));

        let res = app().handle(Request::new(Method::Get, "/users/edit")).await;
        assert_eq!(res.status_code(), Status::NotFound);
        assert_eq!(
            res.json_body().unwrap()["error"]["extra"],
            json!({ "actor": "Users", "action": "Edit" }),
        );
    }

    #[test]
    fn from_config_loads_routes() {
        let config = Config {
            routes: vec![Route::new("/a", "Alpha", "Index"), Route::new("/b", "Beta", "Run")],
            ..Config::default()
        };
        let app = App::from_config(&config).unwrap();
        let paths: Vec<&str> = app.router().routes().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/a", "/b"]);
    }
}
