//! Cross-origin resource sharing.

use async_trait::async_trait;

use super::{Middleware, Next};
use crate::config::CorsConfig;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// Answers preflight requests and tags responses for allowed origins.
///
/// Every `OPTIONS` request is answered here with `200` and the preflight
/// headers, whatever its origin; it never reaches the app. Browsers enforce
/// the origin check themselves from the `access-control-allow-origin` header,
/// which is only sent for allowed origins.
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// Allows every origin with the default methods and headers.
    pub fn permissive() -> Self {
        Self::new(CorsConfig { allowed_origins: vec!["*".to_owned()], ..CorsConfig::default() })
    }

    fn any_origin(&self) -> bool {
        self.config.allowed_origins.iter().any(|o| o == "*")
    }

    /// The `access-control-allow-origin` value for `origin`, if it is allowed.
    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.any_origin() {
            return Some("*".to_owned());
        }
        let origin = origin?;
        self.config.allowed_origins.iter()
            .any(|o| o.eq_ignore_ascii_case(origin))
            .then(|| origin.to_owned())
    }

    fn tag(&self, res: &mut Response, origin: Option<&str>) {
        if let Some(allowed) = self.allow_origin(origin) {
            res.set_header("access-control-allow-origin", &allowed);
            if allowed != "*" {
                res.set_header("vary", "origin");
            }
        }
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn process(&self, req: Request, mut res: Response, next: Next<'_>) -> Response {
        let origin = req.header("origin").map(str::to_owned);

        if req.method() == Method::Options {
            res.set_status(Status::Ok);
            res.set_header("access-control-allow-methods", &self.config.allowed_methods.join(", "));
            res.set_header("access-control-allow-headers", &self.config.allowed_headers.join(", "));
            res.set_header("access-control-max-age", &self.config.max_age.to_string());
            self.tag(&mut res, origin.as_deref());
            return res;
        }

        let mut res = next.run(req, res).await;
        self.tag(&mut res, origin.as_deref());
        res
    }
}
