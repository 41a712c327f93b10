//! Handler trait and type erasure.
//!
//! Direct routes and controller actions keep handlers of different concrete
//! types side by side. Each one is erased into a shared closure from
//! [`Request`] to a boxed future of [`Response`]:
//!
//! ```text
//! async fn show(req: Request) -> Result<Reply, Error>    user code
//!        ↓ Controller::new().action("Show", show)
//! Arc<dyn Fn(Request) -> BoxFuture>                      stored per action
//!        ↓ (handler)(req) at request time
//! Box::pin(async { show(req).await.into_response() })
//! ```
//!
//! Plain closures qualify too, which keeps one-off actions short:
//!
//! ```rust
//! use rebar::{Controller, Request};
//!
//! let greet = Controller::new().action("Hello", |req: Request| async move {
//!     format!("hello {}", req.arg(0).unwrap_or("there"))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future every erased handler returns.
#[doc(hidden)]
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// An erased handler, cloned cheaply into each request that uses it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync + 'static>;

/// Anything callable as `async fn(Request) -> impl IntoResponse`.
///
/// Sealed: the blanket impl below is the only one.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(move |req| {
            let fut = self(req);
            Box::pin(async move { fut.await.into_response() }) as BoxFuture
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::method::Method;
    use crate::status::Status;

    async fn refuse(_req: Request) -> Result<&'static str, Error> {
        Err(Error::Conflict("taken".into()))
    }

    #[tokio::test]
    async fn erased_fn_renders_its_result() {
        let handler = refuse.into_boxed_handler();
        let res = handler(Request::new(Method::Post, "/users")).await;
        assert_eq!(res.status_code(), Status::Conflict);
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let prefix = String::from("path:");
        let handler = (move |req: Request| {
            let out = format!("{prefix}{}", req.path());
            async move { out }
        })
        .into_boxed_handler();

        let shared = Arc::clone(&handler);
        assert_eq!(handler(Request::new(Method::Get, "/a")).await.body(), b"path:/a");
        assert_eq!(shared(Request::new(Method::Get, "/b")).await.body(), b"path:/b");
    }
}
