//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::method::Method;

/// An incoming HTTP request.
///
/// Besides the raw parts, a request carries two kinds of route parameters:
/// named ones captured by `{name}` segments of a direct handler route
/// ([`param`](Request::param)), and positional ones left over after the
/// router picked an actor and action ([`args`](Request::args)).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    args: Vec<String>,
}

impl Request {
    /// Builds a request from a method and a path with an optional query
    /// string, e.g. `"/users?page=2"`.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, Vec::new()),
        };
        Self {
            method,
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            args: Vec::new(),
        }
    }

    /// Adds a header. Returns `self` for chaining.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body. Returns `self` for chaining.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialises `value` as the body and sets `content-type: application/json`.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        let body = value.to_string();
        self.with_header("content-type", "application/json").with_body(body)
    }

    pub(crate) async fn from_hyper(req: hyper::Request<hyper::body::Incoming>) -> Result<Self> {
        let (parts, body) = req.into_parts();
        let method = Method::try_from(&parts.method)
            .map_err(|e| Error::MethodNotAllowed(e.0))?;

        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        let body = body.collect().await?.to_bytes();

        Ok(Self {
            method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(parse_query).unwrap_or_default(),
            headers,
            body,
            params: HashMap::new(),
            args: Vec::new(),
        })
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every decoded `key=value` pair of the query string, in order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// The first query value for `key`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Positional parameters left over after actor and action resolution.
    ///
    /// `/users/show/5` resolved by convention gives `["5"]`.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Deserialises the body as JSON. A malformed body is a `400`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::BadRequest(format!("invalid JSON body: {e}")))
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_path_and_decodes_query() {
        let req = Request::new(Method::Get, "/users?filter%5Bname%5D=ann+lee&page=2");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query("filter[name]"), Some("ann lee"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::Get, "/").with_header("Content-Type", "text/plain");
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let req = Request::new(Method::Post, "/users").with_body("{nope");
        let err = req.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let req = Request::new(Method::Post, "/users").with_json(&json!({ "name": "ann" }));
        assert_eq!(req.json::<serde_json::Value>().unwrap()["name"], "ann");
    }
}
