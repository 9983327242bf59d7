//! Per-call request options and request bodies.
//!
//! [`RequestOptions`] holds what a caller sets for a single call; every field is
//! optional. When a call starts, the options are merged with the client's
//! [`Defaults`] exactly once, producing the [`ResolvedOptions`] that travel with
//! the request through every retry and redirect.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default maximum number of redirect hops.
pub const DEFAULT_MAX_REDIRECTS: usize = 3;
/// Default number of retries beyond the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 0;
/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Default upper bound for a single backoff delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// A request body.
///
/// Only structured (JSON) and text bodies can be sent. A [`Body::Stream`] is
/// accepted by the type system so callers can hand over whatever they have,
/// but dispatch rejects it with [`Error::UnsupportedBody`] before any network
/// I/O happens.
#[derive(Debug, Clone)]
pub enum Body {
    /// A structured value, serialized as JSON on the wire.
    Json(serde_json::Value),
    /// A plain text body, sent as-is.
    Text(String),
    /// A streaming body. Never transmitted.
    Stream(StreamBody),
}

impl Body {
    /// Serializes `value` into a structured body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::configuration(format!("Failed to serialize request body: {}", e)))
    }

    /// Wraps a streaming body.
    pub fn stream(body: impl Into<reqwest::Body>) -> Self {
        Body::Stream(StreamBody(Arc::new(Mutex::new(Some(body.into())))))
    }

    /// Returns `true` if this body exposes a streaming capability.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

/// A streaming body handed to the client.
///
/// Cloning shares the underlying stream; the client itself never consumes it.
#[derive(Clone)]
pub struct StreamBody(Arc<Mutex<Option<reqwest::Body>>>);

impl StreamBody {
    /// Takes the wrapped body back out, leaving nothing behind.
    pub fn take(&self) -> Option<reqwest::Body> {
        self.0.lock().ok()?.take()
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamBody(..)")
    }
}

/// Options for a single call. Unset fields fall back to the client defaults.
///
/// # Examples
///
/// ```
/// use courier::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .with_header("x-request-id", "42")
///     .unwrap()
///     .with_param("page", "2")
///     .with_timeout(Duration::from_secs(2))
///     .with_max_retries(3);
///
/// assert_eq!(options.params.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers for this call. They replace client defaults of the same name.
    pub headers: HeaderMap,

    /// Optional request body.
    pub body: Option<Body>,

    /// Per-attempt timeout. `Duration::ZERO` disables the deadline.
    pub timeout: Option<Duration>,

    /// Maximum number of redirect hops to follow.
    pub max_redirects: Option<usize>,

    /// Maximum number of attempts beyond the first.
    pub max_retries: Option<usize>,

    /// Base delay for exponential backoff.
    pub base_retry_delay: Option<Duration>,

    /// Upper bound for a single backoff delay.
    pub max_retry_delay: Option<Duration>,

    /// Query parameters appended to the URL, in order.
    pub params: Vec<(String, String)>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as a structured JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of redirect hops.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the backoff bounds.
    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_retry_delay = Some(base);
        self.max_retry_delay = Some(max);
        self
    }

    /// Appends a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends several query parameters.
    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    /// Merges these options over `defaults`.
    pub fn resolve(self, defaults: &Defaults) -> ResolvedOptions {
        let mut headers = defaults.headers.clone();
        for name in self.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in self.headers.iter() {
            headers.append(name.clone(), value.clone());
        }

        let timeout = self.timeout.unwrap_or(defaults.timeout);

        ResolvedOptions {
            headers,
            body: self.body,
            timeout: (!timeout.is_zero()).then_some(timeout),
            max_redirects: self.max_redirects.unwrap_or(defaults.max_redirects),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_retry_delay: self.base_retry_delay.unwrap_or(defaults.base_retry_delay),
            max_retry_delay: self.max_retry_delay.unwrap_or(defaults.max_retry_delay),
            params: self.params,
        }
    }
}

/// Client-level defaults, validated once when the client is built.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Headers sent with every request.
    pub headers: HeaderMap,
    /// Per-attempt timeout. `Duration::ZERO` disables the deadline.
    pub timeout: Duration,
    /// Maximum redirect hops.
    pub max_redirects: usize,
    /// Maximum retries beyond the first attempt.
    pub max_retries: usize,
    /// Base backoff delay.
    pub base_retry_delay: Duration,
    /// Backoff ceiling.
    pub max_retry_delay: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay: DEFAULT_BASE_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

/// Options after merging with the client defaults.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Merged headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Body>,
    /// Per-attempt timeout, `None` when disabled.
    pub timeout: Option<Duration>,
    /// Maximum redirect hops.
    pub max_redirects: usize,
    /// Maximum retries beyond the first attempt.
    pub max_retries: usize,
    /// Base backoff delay.
    pub base_retry_delay: Duration,
    /// Backoff ceiling.
    pub max_retry_delay: Duration,
    /// Query parameters appended at context build time.
    pub params: Vec<(String, String)>,
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::configuration(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::configuration(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_defaults_for_unset_fields() {
        let resolved = RequestOptions::new().resolve(&Defaults::default());

        assert_eq!(resolved.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(resolved.max_redirects, 3);
        assert_eq!(resolved.max_retries, 0);
        assert_eq!(resolved.base_retry_delay, Duration::from_millis(500));
        assert_eq!(resolved.max_retry_delay, Duration::from_millis(2000));
        assert!(resolved.body.is_none());
    }

    #[test]
    fn test_per_call_headers_replace_defaults() {
        let mut defaults = Defaults::default();
        defaults
            .headers
            .insert("user-agent", HeaderValue::from_static("default"));
        defaults
            .headers
            .insert("accept", HeaderValue::from_static("*/*"));

        let resolved = RequestOptions::new()
            .with_header("User-Agent", "custom")
            .unwrap()
            .resolve(&defaults);

        assert_eq!(resolved.headers.get("user-agent").unwrap(), "custom");
        assert_eq!(resolved.headers.get("accept").unwrap(), "*/*");
        assert_eq!(resolved.headers.get_all("user-agent").iter().count(), 1);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let resolved = RequestOptions::new()
            .with_timeout(Duration::ZERO)
            .resolve(&Defaults::default());
        assert_eq!(resolved.timeout, None);
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let result = RequestOptions::new().with_header("bad header", "x");
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_body_conversions() {
        assert!(matches!(Body::from("hi"), Body::Text(_)));
        assert!(matches!(
            Body::from(serde_json::json!({"a": 1})),
            Body::Json(_)
        ));
        assert!(Body::stream("chunk").is_stream());
        assert!(!Body::from("chunk").is_stream());
    }

    #[test]
    fn test_rejected_stream_can_be_reclaimed() {
        let options = RequestOptions::new().with_body(Body::stream("chunk"));
        let resolved = options.resolve(&Defaults::default());

        match resolved.body {
            Some(Body::Stream(stream)) => {
                assert!(stream.take().is_some());
                assert!(stream.take().is_none());
            }
            other => panic!("Expected a stream body, got {:?}", other),
        }
    }
}
