//! The uniform response value and the normalizer that builds it.
//!
//! A [`Response`] is built once per completed attempt that ends a call or a
//! redirect hop. Middleware may replace it, and a short-circuiting handler can
//! construct one directly with [`Response::new`].

use crate::transport::Completion;
use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// The body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body was declared as JSON and parsed successfully.
    Json(serde_json::Value),
    /// Anything else, kept as received.
    Text(String),
}

impl ResponseBody {
    /// Returns the raw text if the body was not parsed.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }

    /// Returns the parsed value if the body was JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// A normalized HTTP response.
///
/// # Examples
///
/// ```
/// use courier::{Response, ResponseBody};
/// use http::{HeaderMap, StatusCode};
///
/// let response = Response::new(
///     StatusCode::OK,
///     HeaderMap::new(),
///     ResponseBody::Json(serde_json::json!({"id": 7})),
/// );
///
/// assert!(response.ok);
/// assert_eq!(response.status_text, "OK");
/// assert_eq!(response.json::<serde_json::Value>().unwrap()["id"], 7);
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code.
    pub status_code: StatusCode,

    /// The standard reason phrase, empty for unknown codes.
    pub status_text: String,

    /// The response headers.
    pub headers: HeaderMap,

    /// The parsed or raw body.
    pub body: ResponseBody,

    /// `true` when the status is in `200..300`.
    pub ok: bool,

    /// Retries consumed so far on this call path.
    pub retries: usize,

    /// Redirect hops consumed so far on this call path.
    pub redirects: usize,

    /// Scratch data copied from the request context.
    pub meta: HashMap<String, serde_json::Value>,
}

impl Response {
    /// Creates a response with no retries, redirects or metadata.
    pub fn new(status_code: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status_code,
            status_text: reason_phrase(status_code).to_string(),
            headers,
            body,
            ok: status_code.is_success(),
            retries: 0,
            redirects: 0,
            meta: HashMap::new(),
        }
    }

    /// Builds the response for a completed transport attempt.
    pub(crate) fn normalize(
        completion: Completion,
        retries: usize,
        redirects: usize,
        meta: HashMap<String, serde_json::Value>,
    ) -> Self {
        let body = interpret_body(&completion.headers, completion.text);
        let mut response = Response::new(completion.status, completion.headers, body);
        response.retries = retries;
        response.redirects = redirects;
        response.meta = meta;
        response
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::{Response, ResponseBody};
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("text/plain"));
    ///
    /// let response = Response::new(StatusCode::OK, headers, ResponseBody::Text(String::new()));
    /// assert_eq!(response.header("content-type"), Some("text/plain"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the body as text: the raw text, or the parsed value re-serialized.
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Json(value) => value.to_string(),
        }
    }

    /// Decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.body {
            ResponseBody::Json(value) => T::deserialize(value),
            ResponseBody::Text(text) => serde_json::from_str(text),
        }
    }

    /// Returns `true` if at least one retry was consumed.
    pub fn was_retried(&self) -> bool {
        self.retries > 0
    }

    /// Returns `true` if at least one redirect was followed.
    pub fn was_redirected(&self) -> bool {
        self.redirects > 0
    }
}

fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

fn interpret_body(headers: &HeaderMap, text: String) -> ResponseBody {
    if !is_json(headers) {
        return ResponseBody::Text(text);
    }

    match serde_json::from_str(&text) {
        Ok(value) => ResponseBody::Json(value),
        Err(e) => {
            tracing::debug!(error = %e, "JSON response body did not parse, keeping raw text");
            ResponseBody::Text(text)
        }
    }
}
