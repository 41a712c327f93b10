//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::builder().status()`, a [`Reply`](crate::rest::Reply), or as a
//! bare handler return value.
//!
//! ```rust
//! use rebar::{Request, Response, Status};
//!
//! // status-only, no body
//! Response::status(Status::NoContent);
//!
//! // return Status directly from a handler, rebar wraps it
//! async fn delete_user(_req: Request) -> Status {
//!     Status::NoContent
//! }
//! ```
//!
//! Only the codes a framework like rebar produces itself are named here.
//! Anything else can still travel through [`Status::Other`].

use std::fmt;

/// An HTTP status code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    Accepted,            // 202
    NoContent,           // 204

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MovedPermanently,    // 301
    Found,               // 302
    SeeOther,            // 303
    NotModified,         // 304

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    Unauthorized,        // 401
    Forbidden,           // 403
    NotFound,            // 404
    MethodNotAllowed,    // 405
    Conflict,            // 409
    UnprocessableContent, // 422
    TooManyRequests,     // 429

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
    NotImplemented,      // 501
    ServiceUnavailable,  // 503

    /// Any other code, carried verbatim.
    Other(u16),
}

impl Status {
    /// The numeric code (e.g. `404`).
    pub fn code(self) -> u16 {
        match self {
            Self::Ok                   => 200,
            Self::Created              => 201,
            Self::Accepted             => 202,
            Self::NoContent            => 204,
            Self::MovedPermanently     => 301,
            Self::Found                => 302,
            Self::SeeOther             => 303,
            Self::NotModified          => 304,
            Self::BadRequest           => 400,
            Self::Unauthorized         => 401,
            Self::Forbidden            => 403,
            Self::NotFound             => 404,
            Self::MethodNotAllowed     => 405,
            Self::Conflict             => 409,
            Self::UnprocessableContent => 422,
            Self::TooManyRequests      => 429,
            Self::InternalServerError  => 500,
            Self::NotImplemented       => 501,
            Self::ServiceUnavailable   => 503,
            Self::Other(code)          => code,
        }
    }

    /// Maps a numeric code back to its named variant, or [`Status::Other`].
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => Self::Ok,
            201 => Self::Created,
            202 => Self::Accepted,
            204 => Self::NoContent,
            301 => Self::MovedPermanently,
            302 => Self::Found,
            303 => Self::SeeOther,
            304 => Self::NotModified,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            409 => Self::Conflict,
            422 => Self::UnprocessableContent,
            429 => Self::TooManyRequests,
            500 => Self::InternalServerError,
            501 => Self::NotImplemented,
            503 => Self::ServiceUnavailable,
            other => Self::Other(other),
        }
    }

    /// `true` for 4xx and 5xx codes.
    pub fn is_error(self) -> bool {
        self.code() >= 400
    }

    /// `true` for 5xx codes.
    pub fn is_server_error(self) -> bool {
        self.code() >= 500
    }

    /// Canonical reason phrase, falling back to the one `http` knows about.
    pub fn reason(self) -> &'static str {
        http::StatusCode::from_u16(self.code())
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}
