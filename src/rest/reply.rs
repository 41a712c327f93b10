//! The JSON envelope every REST response travels in.
//!
//! ```text
//! 200  { "data": [...], "meta": { "page": 1, "pages": 3, "count": 25 } }
//! 404  { "error": { "code": 404, "message": "no users with id 9", "extra": null } }
//! 204  (no body)
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::data::Pagination;
use crate::error::Error;
use crate::response::{IntoResponse, Response};
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    pub extra: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: Status,
    data: Value,
    meta: Map<String, Value>,
    error: Option<ErrorBody>,
}

impl Reply {
    /// `200 OK` with `data`.
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self { status: Status::Ok, data, meta: Map::new(), error: None },
            Err(e) => {
                error!("failed to serialise reply data: {e}");
                Self::error(Status::InternalServerError, "internal server error")
            }
        }
    }

    /// `201 Created` with `data`.
    pub fn created(data: impl Serialize) -> Self {
        Self::ok(data).with_status(Status::Created)
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self { status: Status::NoContent, data: Value::Null, meta: Map::new(), error: None }
    }

    /// A page of records plus `{page, pages, count}` meta.
    pub fn page(data: impl Serialize, page: Pagination, count: u64) -> Self {
        Self::ok(data)
            .with_meta("page", json!(page.page))
            .with_meta("pages", json!(page.pages(count)))
            .with_meta("count", json!(count))
    }

    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            data: Value::Null,
            meta: Map::new(),
            error: Some(ErrorBody { code: status.code(), message: message.into(), extra: Value::Null }),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        if let Some(body) = &mut self.error {
            body.code = status.code();
        }
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_owned(), value);
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        if let Some(body) = &mut self.error {
            body.extra = extra;
        }
        self
    }

    pub fn status(&self) -> Status { self.status }
    pub fn data(&self) -> &Value { &self.data }
    pub fn meta(&self) -> &Map<String, Value> { &self.meta }
    pub fn error_body(&self) -> Option<&ErrorBody> { self.error.as_ref() }

    /// The envelope as JSON. `meta` is omitted when empty.
    pub fn to_json(&self) -> Value {
        if let Some(error) = &self.error {
            return json!({ "error": error });
        }
        let mut envelope = Map::new();
        envelope.insert("data".to_owned(), self.data.clone());
        if !self.meta.is_empty() {
            envelope.insert("meta".to_owned(), Value::Object(self.meta.clone()));
        }
        Value::Object(envelope)
    }
}

impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Error> for Reply {
    fn from(e: Error) -> Self {
        let status = e.status();
        if status.is_server_error() {
            error!(error = %e, "request failed");
        } else {
            debug!(error = %e, status = status.code(), "request rejected");
        }
        Reply::error(status, e.public_message()).with_extra(e.extra())
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        if self.status == Status::NoContent {
            return Response::status(Status::NoContent);
        }
        let status = self.status;
        match serde_json::to_vec(&self.to_json()) {
            Ok(body) => Response::builder().status(status).json(body),
            Err(e) => {
                error!("failed to serialise reply: {e}");
                Response::status(Status::InternalServerError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_reply_carries_meta() {
        let reply = Reply::page(json!([{ "id": 1 }]), Pagination::new(1, 10), 25);
        assert_eq!(reply.to_json(), json!({
            "data": [{ "id": 1 }],
            "meta": { "page": 1, "pages": 3, "count": 25 },
        }));
    }

    #[test]
    fn plain_reply_omits_empty_meta() {
        assert_eq!(Reply::ok(json!({ "id": 1 })).to_json(), json!({ "data": { "id": 1 } }));
    }

    #[test]
    fn error_reply_uses_error_envelope() {
        let reply = Reply::from(Error::NotFound("no users with id 9".into()));
        assert_eq!(reply.status(), Status::NotFound);
        assert_eq!(reply.to_json(), json!({
            "error": { "code": 404, "message": "no users with id 9", "extra": null },
        }));
    }

    #[test]
    fn no_content_has_no_body() {
        let res = Reply::no_content().into_response();
        assert_eq!(res.status_code(), Status::NoContent);
        assert!(res.body().is_empty());
    }

    #[test]
    fn created_reply_renders_status_and_json() {
        let res = Reply::created(json!({ "id": 5 })).into_response();
        assert_eq!(res.status_code(), Status::Created);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.json_body().unwrap(), json!({ "data": { "id": 5 } }));
    }
}
