//! Per-request tracing.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, info, info_span, warn};

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Opens a `request` span carrying the method and path, and logs the status
/// and latency once the response is ready. Register it first so the span
/// covers every later stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct Trace;

#[async_trait]
impl Middleware for Trace {
    async fn process(&self, req: Request, res: Response, next: Next<'_>) -> Response {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        async move {
            let started = Instant::now();
            let res = next.run(req, res).await;
            let status = res.status_code();
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            if status.is_server_error() {
                warn!(status = status.code(), latency_ms, "request failed");
            } else {
                info!(status = status.code(), latency_ms, "request completed");
            }
            res
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::middleware::{Endpoint, Pipeline};
    use crate::status::Status;

    struct Created;

    #[async_trait]
    impl Endpoint for Created {
        async fn call(&self, _req: Request, _res: Response) -> Response {
            Response::status(Status::Created)
        }
    }

    #[tokio::test]
    async fn passes_the_response_through() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut pipeline = Pipeline::new();
        pipeline.push(Trace);
        let res = pipeline.run(Request::new(Method::Post, "/users"), &Created).await;
        assert_eq!(res.status_code(), Status::Created);
    }
}
