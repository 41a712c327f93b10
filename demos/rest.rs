//! REST demo: an in-memory users/orders API behind tracing, CORS and
//! bearer-token middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example rest
//!
//! Every route sits behind the bearer check, so pass the demo token:
//!
//!   curl -H 'authorization: Bearer demo' http://localhost:3000/healthz
//!   curl -H 'authorization: Bearer demo' 'http://localhost:3000/users?filter[age][gte]=30&order=-age'
//!   curl -H 'authorization: Bearer demo' http://localhost:3000/users/1/orders
//!   curl -X POST -H 'authorization: Bearer demo' -H 'content-type: application/json' \
//!        -d '{"name":"dee","email":"dee@example.com","age":27}' http://localhost:3000/users
//!   curl -X DELETE -H 'authorization: Bearer demo' http://localhost:3000/users/2
//!   curl -H 'authorization: Bearer demo' http://localhost:3000/pages/about

use std::sync::Arc;

use rebar::data::{HasMany, MemoryMapper};
use rebar::middleware::{BearerAuth, Cors, Trace};
use rebar::model::{Model, ModelError, Schema};
use rebar::{App, Config, Controller, Method, Request, Server, health};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> rebar::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let orders = Arc::new(MemoryMapper::new(
        Schema::new()
            .property("id", Value::Null)
            .property("user_id", Value::Null)
            .property("total", json!(0))
            .build(),
    ));
    orders.seed([
        json!({ "user_id": 1, "total": 42 }),
        json!({ "user_id": 1, "total": 7 }),
        json!({ "user_id": 3, "total": 19 }),
    ]).await?;

    let users = MemoryMapper::new(
        Schema::new()
            .property("id", Value::Null)
            .property("name", json!(""))
            .property("email", Value::Null)
            .property("age", json!(0))
            .setter("email", lowercase_email)
            .getter("initial", initial)
            .build(),
    )
    .with_unique("email")
    .with_relation("Orders", Arc::new(HasMany::new(orders, "user_id")));
    users.seed([
        json!({ "name": "ada", "email": "ada@example.com", "age": 36 }),
        json!({ "name": "bob", "email": "bob@example.com", "age": 19 }),
        json!({ "name": "cyd", "email": "cyd@example.com", "age": 52 }),
    ]).await?;

    let app = App::from_config(&config)?;
    let users = app.repository(Arc::new(users));
    let app = app
        .wrap(Trace)
        .wrap(Cors::new(config.cors.clone()))
        .on(Method::Get, "/healthz", health::liveness)
        .on(Method::Get, "/readyz", health::readiness)
        .actor("Pages", Controller::new().action("About", about))
        .resource("/users", "Users", users)?
        .wrap(BearerAuth::new(|token| token == "demo"));

    Server::from_config(&config.server).serve(app).await
}

fn lowercase_email(model: &mut Model, value: Value) -> Result<(), ModelError> {
    match value {
        Value::String(email) if email.contains('@') => {
            model.set_raw("email", Value::String(email.to_lowercase()))
        }
        Value::Null => model.set_raw("email", Value::Null),
        _ => Err(ModelError::invalid("email", "must be an address")),
    }
}

fn initial(model: &Model) -> Value {
    match model.get_raw("name") {
        Ok(Value::String(name)) => name.chars().next().map_or(Value::Null, |c| json!(c.to_string())),
        _ => Value::Null,
    }
}

async fn about(_req: Request) -> &'static str {
    "rebar REST demo"
}
