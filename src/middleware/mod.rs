//! Middleware pipeline.
//!
//! Middleware sees every request before the app does and every response on
//! the way out. Each stage receives the request, the response built so far
//! and a [`Next`] handle; calling [`Next::run`] hands control to the rest of
//! the chain, returning without calling it short-circuits.
//!
//! ```text
//! Trace → Cors → BearerAuth → endpoint (direct handlers, router, actors)
//! ```
//!
//! Stages run strictly in registration order, one at a time per request.
//!
//! ```rust
//! use async_trait::async_trait;
//! use rebar::middleware::{Middleware, Next};
//! use rebar::{Request, Response};
//!
//! struct PoweredBy;
//!
//! #[async_trait]
//! impl Middleware for PoweredBy {
//!     async fn process(&self, req: Request, res: Response, next: Next<'_>) -> Response {
//!         let mut res = next.run(req, res).await;
//!         res.set_header("x-powered-by", "rebar");
//!         res
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::request::Request;
use crate::response::Response;

mod auth;
mod cors;
mod trace;

pub use auth::BearerAuth;
pub use cors::Cors;
pub use trace::Trace;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn process(&self, req: Request, res: Response, next: Next<'_>) -> Response;
}

/// The innermost stage: whatever produces the real response.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request, res: Response) -> Response;
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Runs the next stage, or the endpoint once the chain is exhausted.
    pub async fn run(self, req: Request, res: Response) -> Response {
        match self.chain.split_first() {
            Some((first, rest)) => {
                let next = Next { chain: rest, endpoint: self.endpoint };
                first.process(req, res, next).await
            }
            None => self.endpoint.call(req, res).await,
        }
    }
}

/// An ordered list of middleware.
#[derive(Default, Clone)]
pub struct Pipeline {
    chain: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: impl Middleware) {
        self.chain.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Sends `req` through every stage and then `endpoint`.
    pub async fn run(&self, req: Request, endpoint: &dyn Endpoint) -> Response {
        let next = Next { chain: &self.chain, endpoint };
        next.run(req, Response::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::status::Status;
    use std::sync::Mutex;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn process(&self, req: Request, res: Response, next: Next<'_>) -> Response {
            self.log.lock().unwrap().push(format!("{} in", self.name));
            let res = next.run(req, res).await;
            self.log.lock().unwrap().push(format!("{} out", self.name));
            res
        }
    }

    struct Stop;

    #[async_trait]
    impl Middleware for Stop {
        async fn process(&self, _req: Request, _res: Response, _next: Next<'_>) -> Response {
            Response::status(Status::Forbidden)
        }
    }

    struct Hello;

    #[async_trait]
    impl Endpoint for Hello {
        async fn call(&self, _req: Request, _res: Response) -> Response {
            Response::text("hello")
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_around_the_endpoint() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Record { name: "a", log: Arc::clone(&log) });
        pipeline.push(Record { name: "b", log: Arc::clone(&log) });

        let res = pipeline.run(Request::new(Method::Get, "/"), &Hello).await;
        assert_eq!(res.body(), b"hello");
        assert_eq!(*log.lock().unwrap(), ["a in", "b in", "b out", "a out"]);
    }

    #[tokio::test]
    async fn returning_early_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Stop);
        pipeline.push(Record { name: "a", log: Arc::clone(&log) });

        let res = pipeline.run(Request::new(Method::Get, "/"), &Hello).await;
        assert_eq!(res.status_code(), Status::Forbidden);
        assert!(log.lock().unwrap().is_empty());
    }
}
