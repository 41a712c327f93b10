//! Bearer-token authentication.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Middleware, Next};
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

type Validator = dyn Fn(&str) -> bool + Send + Sync;

/// Rejects requests without an acceptable `Authorization: Bearer <token>`.
///
/// A missing or malformed header answers `401` with a `www-authenticate`
/// challenge; a well-formed token the validator refuses answers `403`.
///
/// ```rust
/// use rebar::middleware::BearerAuth;
///
/// let auth = BearerAuth::new(|token| token == "s3cret");
/// ```
pub struct BearerAuth {
    validate: Arc<Validator>,
}

impl BearerAuth {
    pub fn new(validate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self { validate: Arc::new(validate) }
    }
}

enum Verdict {
    Missing,
    Rejected,
    Accepted,
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn process(&self, req: Request, res: Response, next: Next<'_>) -> Response {
        let verdict = match bearer_token(req.header("authorization")) {
            None => Verdict::Missing,
            Some(token) if (self.validate)(token) => Verdict::Accepted,
            Some(_) => Verdict::Rejected,
        };

        match verdict {
            Verdict::Accepted => next.run(req, res).await,
            Verdict::Missing => {
                debug!(path = req.path(), "missing bearer token");
                let mut res = Error::Unauthorized("missing bearer token".to_owned()).into_response();
                res.set_header("www-authenticate", "Bearer");
                res
            }
            Verdict::Rejected => {
                debug!(path = req.path(), "bearer token rejected");
                Error::Forbidden("invalid token".to_owned()).into_response()
            }
        }
    }
}

/// The token of a `Bearer <token>` header. The scheme is case-insensitive.
fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::middleware::{Endpoint, Pipeline};
    use crate::status::Status;

    struct Secret;

    #[async_trait]
    impl Endpoint for Secret {
        async fn call(&self, _req: Request, _res: Response) -> Response {
            Response::text("secret")
        }
    }

    fn pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.push(BearerAuth::new(|token| token == "letmein"));
        pipeline
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let res = pipeline().run(Request::new(Method::Get, "/"), &Secret).await;
        assert_eq!(res.status_code(), Status::Unauthorized);
        assert_eq!(res.header("www-authenticate"), Some("Bearer"));
    }

    #[tokio::test]
    async fn wrong_token_is_forbidden() {
        let req = Request::new(Method::Get, "/").with_header("authorization", "Bearer nope");
        let res = pipeline().run(req, &Secret).await;
        assert_eq!(res.status_code(), Status::Forbidden);
    }

    #[tokio::test]
    async fn valid_token_passes_through() {
        let req = Request::new(Method::Get, "/").with_header("authorization", "Bearer letmein");
        let res = pipeline().run(req, &Secret).await;
        assert_eq!(res.body(), b"secret");
    }
}
