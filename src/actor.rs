//! Actors: the request-handling units the router selects.
//!
//! An [`Actor`] answers two questions: does it have an action by this name,
//! and what does that action respond to a request. [`Controller`] is the
//! everyday actor, a table of named handlers:
//!
//! ```rust
//! use rebar::{Controller, Json, Request};
//! use serde_json::json;
//!
//! async fn index(_req: Request) -> &'static str { "all users" }
//!
//! async fn show(req: Request) -> Json<serde_json::Value> {
//!     Json(json!({ "id": req.arg(0) }))
//! }
//!
//! let users = Controller::new()
//!     .action("Index", index)
//!     .action("Show", show);
//! ```
//!
//! REST [`Repository`](crate::rest::Repository) values are actors too; they
//! ignore the action and dispatch on the HTTP method.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// `true` if `action` names something this actor can run.
    fn handles(&self, action: &str) -> bool;

    /// Runs `action`. Only called after [`handles`](Actor::handles) agreed.
    async fn call(&self, action: &str, req: Request) -> Response;
}

/// An actor built from named action handlers.
#[derive(Default)]
pub struct Controller {
    actions: HashMap<String, BoxedHandler>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`. Action names are matched exactly,
    /// and the router capitalises conventional ones (`/users/show` → `Show`).
    pub fn action(mut self, name: &str, handler: impl Handler) -> Self {
        self.actions.insert(name.to_owned(), handler.into_boxed_handler());
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

#[async_trait]
impl Actor for Controller {
    fn handles(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    async fn call(&self, action: &str, req: Request) -> Response {
        match self.actions.get(action) {
            Some(handler) => handler(req).await,
            // The registry knows the actor's name; a controller only knows
            // its actions.
            None => Error::NotFound(format!("no action `{action}`")).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::status::Status;

    async fn echo_args(req: Request) -> String {
        req.args().join(",")
    }

    #[tokio::test]
    async fn runs_named_action() {
        let controller = Controller::new().action("Show", echo_args);
        assert!(controller.handles("Show"));
        assert!(!controller.handles("show"));

        let mut req = Request::new(Method::Get, "/users/show/5/6");
        req.set_args(vec!["5".into(), "6".into()]);
        let res = controller.call("Show", req).await;
        assert_eq!(res.body(), b"5,6");
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let controller = Controller::new();
        let res = controller.call("Missing", Request::new(Method::Get, "/")).await;
        assert_eq!(res.status_code(), Status::NotFound);
        let body = res.json_body().unwrap();
        assert_eq!(body["error"]["message"], "no action `Missing`");
        assert_eq!(body["error"]["extra"], serde_json::Value::Null);
    }
}
