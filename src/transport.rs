//! Single-attempt dispatch over reqwest.
//!
//! A [`RequestDescriptor`] is the low-level form of a context: scheme, host,
//! resolved port, path with query, final headers, timeout and encoded body.
//! Dispatching it yields exactly one [`Outcome`].

use crate::{options::Body, Context, Error, Result};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Plain or secure transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `http`
    Http,
    /// `https`
    Https,
}

impl Scheme {
    fn from_url(url: &Url) -> Option<Self> {
        match url.scheme() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    /// The port used when the URL does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Everything needed to put one request on the wire.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Plain or secure transport.
    pub scheme: Scheme,
    /// The HTTP method.
    pub method: Method,
    /// The host name or address.
    pub host: String,
    /// The port, defaulted from the scheme when the URL has none.
    pub port: u16,
    /// Path plus query string.
    pub path: String,
    /// Final request headers.
    pub headers: HeaderMap,
    /// Per-attempt deadline.
    pub timeout: Option<Duration>,
    /// Encoded body, if one is sent.
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Lowers a context into a descriptor.
    ///
    /// Bodies are only transmitted for methods other than GET and HEAD.
    /// Structured bodies get a JSON content type unless one was set, and every
    /// transmitted body gets a byte-accurate content length.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedBody`] if the body is a stream.
    /// - [`Error::Configuration`] if the URL is not an absolute http(s) URL.
    pub fn from_context(ctx: &Context, attempt: usize) -> Result<Self> {
        if ctx.options.body.as_ref().is_some_and(Body::is_stream) {
            return Err(Error::UnsupportedBody {
                request: Box::new(ctx.snapshot(attempt)),
            });
        }

        let scheme = Scheme::from_url(&ctx.url).ok_or_else(|| {
            Error::configuration(format!("Unsupported URL scheme: {}", ctx.url.scheme()))
                .with_request(ctx.snapshot(attempt))
        })?;
        let host = ctx
            .url
            .host_str()
            .ok_or_else(|| {
                Error::configuration(format!("URL has no host: {}", ctx.url))
                    .with_request(ctx.snapshot(attempt))
            })?
            .to_string();
        let port = ctx.url.port().unwrap_or_else(|| scheme.default_port());

        let mut path = ctx.url.path().to_string();
        if let Some(query) = ctx.url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut headers = ctx.options.headers.clone();
        let body = match &ctx.options.body {
            Some(body) if sends_body(&ctx.method) => {
                let bytes = match body {
                    Body::Json(value) => {
                        if !headers.contains_key(CONTENT_TYPE) {
                            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                        }
                        serde_json::to_vec(value).map_err(|e| {
                            Error::configuration(format!("Failed to serialize request body: {}", e))
                                .with_request(ctx.snapshot(attempt))
                        })?
                    }
                    Body::Text(text) => text.clone().into_bytes(),
                    Body::Stream(_) => Vec::new(),
                };
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Some(bytes)
            }
            _ => None,
        };

        Ok(Self {
            scheme,
            method: ctx.method.clone(),
            host,
            port,
            path,
            headers,
            timeout: ctx.options.timeout,
            body,
        })
    }

    /// The absolute URL this descriptor addresses.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.path
        ))
        .map_err(|e| Error::configuration(format!("Invalid request URL: {}", e)))
    }
}

fn sends_body(method: &Method) -> bool {
    method != Method::GET && method != Method::HEAD
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The whole body as text.
    pub text: String,
}

/// The result of one attempt.
#[derive(Debug)]
pub enum Outcome {
    /// The server answered.
    Completed(Completion),
    /// The connection failed.
    Failed(reqwest::Error),
    /// The deadline elapsed and the attempt was aborted.
    TimedOut(Duration),
}

/// Performs attempts over a shared reqwest client.
#[derive(Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub(crate) fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Dispatches one attempt.
    ///
    /// Errors are reserved for requests that cannot be put on the wire at
    /// all; everything that happens once I/O starts is an [`Outcome`].
    pub(crate) async fn dispatch(&self, ctx: &Context, attempt: usize) -> Result<Outcome> {
        let descriptor = RequestDescriptor::from_context(ctx, attempt)?;
        let url = descriptor
            .url()
            .map_err(|e| e.with_request(ctx.snapshot(attempt)))?;

        tracing::debug!(
            method = %descriptor.method,
            scheme = %descriptor.scheme,
            host = %descriptor.host,
            port = descriptor.port,
            path = %descriptor.path,
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut request = self
            .client
            .request(descriptor.method, url)
            .headers(descriptor.headers);
        if let Some(body) = descriptor.body {
            request = request.body(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>(Completion {
                status,
                headers,
                text,
            })
        };

        let result = match descriptor.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(result) => result,
                // Dropping the exchange future aborts the connection.
                Err(_) => return Ok(Outcome::TimedOut(timeout)),
            },
            None => exchange.await,
        };

        Ok(match result {
            Ok(completion) => Outcome::Completed(completion),
            Err(e) => Outcome::Failed(e),
        })
    }
}
