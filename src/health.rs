//! Built-in health-check handlers.
//!
//! | Check | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can it serve traffic? Failure → pulled from the load balancer. |
//!
//! Register them as direct handlers:
//!
//! ```rust
//! use rebar::{App, Method, health};
//!
//! let app = App::new()
//!     .on(Method::Get, "/healthz", health::liveness)
//!     .on(Method::Get, "/readyz", health::readiness);
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependencies such
//! as a database connection:
//!
//! ```rust
//! use rebar::rest::Reply;
//! use rebar::{Request, Status};
//!
//! async fn readiness(_req: Request) -> Reply {
//!     if database_is_up().await {
//!         Reply::ok(serde_json::json!({ "status": "ready" }))
//!     } else {
//!         Reply::error(Status::ServiceUnavailable, "database unavailable")
//!     }
//! }
//!
//! async fn database_is_up() -> bool { true }
//! ```

use serde_json::json;

use crate::request::Request;
use crate::rest::Reply;

/// Always `200` with `{"data":{"status":"ok"}}`. No dependencies on purpose.
pub async fn liveness(_req: Request) -> Reply {
    Reply::ok(json!({ "status": "ok" }))
}

/// `200` with `{"data":{"status":"ready"}}`.
pub async fn readiness(_req: Request) -> Reply {
    Reply::ok(json!({ "status": "ready" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::response::IntoResponse;
    use crate::status::Status;

    #[tokio::test]
    async fn health_checks_answer_ok() {
        let res = liveness(Request::new(Method::Get, "/healthz")).await.into_response();
        assert_eq!(res.status_code(), Status::Ok);
        assert_eq!(res.json_body().unwrap(), json!({ "data": { "status": "ok" } }));

        let res = readiness(Request::new(Method::Get, "/readyz")).await.into_response();
        assert_eq!(res.json_body().unwrap()["data"]["status"], "ready");
    }
}
