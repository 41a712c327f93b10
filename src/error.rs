//! Unified error type.
//!
//! Every failure a request can hit ends up as an [`Error`]. The boundary maps
//! each variant to an HTTP status with [`Error::status`] and renders it through
//! the [`Reply`](crate::rest::Reply) envelope:
//!
//! | Variant | Status |
//! |---|---|
//! | `Validation`, `Model`, `Filter` | 422 |
//! | `BadRequest`, `Http` | 400 |
//! | `Unauthorized` | 401 |
//! | `Forbidden` | 403 |
//! | `NotFound`, `Route` | 404 |
//! | `MethodNotAllowed` | 405 |
//! | `Conflict` | 409 |
//! | `Database`, `Io`, `Config`, `Address` | 500 |

use serde_json::{Value, json};
use thiserror::Error;

use crate::data::FilterError;
use crate::model::ModelError;
use crate::router::RouteError;
use crate::status::Status;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by rebar's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid socket address `{0}`")]
    Address(String),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database: {0}")]
    Database(String),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::Model(_) | Self::Filter(_) => Status::UnprocessableContent,
            Self::BadRequest(_) | Self::Http(_)                    => Status::BadRequest,
            Self::Unauthorized(_)                                  => Status::Unauthorized,
            Self::Forbidden(_)                                     => Status::Forbidden,
            Self::NotFound(_) | Self::Route(_)                     => Status::NotFound,
            Self::MethodNotAllowed(_)                              => Status::MethodNotAllowed,
            Self::Conflict(_)                                      => Status::Conflict,
            Self::Database(_) | Self::Io(_) | Self::Config(_) | Self::Address(_) => {
                Status::InternalServerError
            }
        }
    }

    /// Client-facing message. Server-side failures never leak their detail.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "internal server error".to_owned()
        } else {
            self.to_string()
        }
    }

    /// Structured detail for the `extra` field of the error envelope.
    pub fn extra(&self) -> Value {
        match self {
            Self::Model(ModelError::UnknownProperty(name)) => json!({ "property": name }),
            Self::Model(ModelError::Invalid { property, .. }) => json!({ "property": property }),
            Self::Filter(e) => json!({ "property": e.property() }),
            Self::Route(RouteError::ActorNotFound(actor)) => json!({ "actor": actor }),
            Self::Route(RouteError::ActionNotFound { actor, action }) => {
                json!({ "actor": actor, "action": action })
            }
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_status_mapping() {
        assert_eq!(Error::Validation("x".into()).status(), Status::UnprocessableContent);
        assert_eq!(Error::Forbidden("x".into()).status(), Status::Forbidden);
        assert_eq!(Error::NotFound("x".into()).status(), Status::NotFound);
        assert_eq!(Error::Conflict("x".into()).status(), Status::Conflict);
        assert_eq!(Error::Database("x".into()).status(), Status::InternalServerError);
        assert_eq!(
            Error::from(RouteError::ActorNotFound("Users".into())).status(),
            Status::NotFound
        );
    }

    #[test]
    fn server_errors_hide_their_detail() {
        let err = Error::Database("duplicate key in users_pkey".into());
        assert_eq!(err.public_message(), "internal server error");
        let err = Error::NotFound("user 7".into());
        assert_eq!(err.public_message(), "user 7");
    }

    #[test]
    fn model_errors_name_the_property() {
        let err = Error::from(ModelError::UnknownProperty("nickname".into()));
        assert_eq!(err.extra(), json!({ "property": "nickname" }));
        assert_eq!(err.status(), Status::UnprocessableContent);
    }
}
