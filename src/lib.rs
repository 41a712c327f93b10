//! # rebar
//!
//! A small MVC-style web framework on hyper and tokio.
//!
//! ## The pieces
//!
//! - **Routing**: explicit routes first, then the path names the target,
//!   `/users/show/5` → actor `Users`, action `Show`, params `["5"]`.
//!   Direct handlers (`/healthz`, `/users/{id}`) sit on a [`matchit`] radix
//!   tree in front of both.
//! - **Actors**: a [`Controller`] holds named actions; a
//!   [`Repository`](rest::Repository) turns HTTP verbs into CRUD calls.
//! - **Middleware**: a linear pipeline; any stage can answer early.
//! - **Models**: property bags with getter/setter overrides and dirty
//!   tracking, persisted through a [`Mapper`](data::Mapper).
//! - **Queries**: `?filter[age][gte]=18&order=-age&page=2` becomes typed
//!   filters, sorts and pagination.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rebar::data::MemoryMapper;
//! use rebar::middleware::{Cors, Trace};
//! use rebar::model::Schema;
//! use rebar::{App, Config, Method, Server, health};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> rebar::Result<()> {
//!     let config = Config::load()?;
//!
//!     let schema = Schema::new()
//!         .property("id", Value::Null)
//!         .property("name", json!(""))
//!         .build();
//!     let users = Arc::new(MemoryMapper::new(schema));
//!
//!     let app = App::from_config(&config)?;
//!     let repository = app.repository(users);
//!     let app = app
//!         .wrap(Trace)
//!         .wrap(Cors::new(config.cors.clone()))
//!         .on(Method::Get, "/healthz", health::liveness)
//!         .resource("/users", "Users", repository)?;
//!
//!     Server::from_config(&config.server).serve(app).await
//! }
//! ```

mod actor;
mod app;
mod config;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod data;
pub mod health;
pub mod middleware;
pub mod model;
pub mod rest;

pub use actor::{Actor, Controller};
pub use app::App;
pub use config::{Config, CorsConfig, RestConfig, ServerConfig};
pub use error::{Error, Result};
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::{DEFAULT_NAME, Resolution, Route, RouteError, Router, capitalize};
pub use server::Server;
pub use status::Status;
