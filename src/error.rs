//! Error types for HTTP calls.
//!
//! Every failure raised while a call is in flight carries a [`RequestSnapshot`]
//! describing the request as it stood at the point of failure. HTTP status
//! failures additionally carry the final [`Response`].

use crate::{middleware::Phase, options::ResolvedOptions, Response};
use http::{Method, StatusCode};
use std::time::Duration;

/// A boxed error returned by middleware handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The request as it stood when a call failed.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    /// The HTTP method.
    pub method: Method,
    /// The URL of the failing attempt, fully resolved once a context exists.
    pub url: String,
    /// The resolved options in effect.
    pub options: ResolvedOptions,
    /// The attempt number, starting at 0.
    pub attempt: usize,
}

/// The main error type for HTTP calls.
///
/// # Examples
///
/// ```no_run
/// use courier::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.get("https://api.example.com/endpoint").await {
///     Ok(response) => println!("Success: {:?}", response.body),
///     Err(Error::Http { response, request }) => {
///         eprintln!(
///             "HTTP {} from {} after attempt {}",
///             response.status_code, request.url, request.attempt
///         );
///     }
///     Err(Error::Timeout { timeout, .. }) => eprintln!("Gave up after {:?}", timeout),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration was provided.
    ///
    /// Raised by the client builder for bad defaults, and during a call for a
    /// URL that cannot be resolved or per-call input that cannot be encoded.
    /// Construction-time errors carry no request snapshot.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was wrong.
        message: String,
        /// The request, when the error was raised during a call.
        request: Option<Box<RequestSnapshot>>,
    },

    /// A middleware handler returned a result that breaks the chain contract.
    #[error("Middleware contract violated in {phase} phase: {message}")]
    MiddlewareContract {
        /// The phase the handler ran in.
        phase: Phase,
        /// What was wrong with the handler's return.
        message: String,
        /// The request at the point of failure.
        request: Box<RequestSnapshot>,
    },

    /// A middleware handler failed. The handler's own error is kept as the source.
    #[error("Middleware failed in {phase} phase: {source}")]
    Middleware {
        /// The phase the handler ran in.
        phase: Phase,
        /// The error the handler returned.
        source: BoxError,
        /// The request at the point of failure.
        request: Box<RequestSnapshot>,
    },

    /// A streaming body was supplied. No network I/O was attempted.
    #[error("Unsupported request body: streaming bodies cannot be sent")]
    UnsupportedBody {
        /// The request that carried the body.
        request: Box<RequestSnapshot>,
    },

    /// A connection-level failure (DNS, refusal, reset).
    #[error("Transport error: {source}")]
    Transport {
        /// The underlying transport error.
        source: reqwest::Error,
        /// The request at the point of failure.
        request: Box<RequestSnapshot>,
    },

    /// The attempt exceeded its deadline. Never retried.
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// The per-attempt deadline that elapsed.
        timeout: Duration,
        /// The request at the point of failure.
        request: Box<RequestSnapshot>,
    },

    /// The final response had an error status.
    #[error("HTTP error {}", .response.status_code.as_u16())]
    Http {
        /// The final response.
        response: Box<Response>,
        /// The request that produced it.
        request: Box<RequestSnapshot>,
    },
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            request: None,
        }
    }

    /// Attaches a request snapshot to a configuration error raised mid-call.
    pub(crate) fn with_request(self, snapshot: RequestSnapshot) -> Self {
        match self {
            Error::Configuration { message, .. } => Error::Configuration {
                message,
                request: Some(Box::new(snapshot)),
            },
            other => other,
        }
    }

    /// Returns the request snapshot.
    ///
    /// Present for every error raised during a call; `None` only for
    /// configuration errors raised while building a client.
    pub fn request(&self) -> Option<&RequestSnapshot> {
        match self {
            Error::Configuration { request, .. } => request.as_deref(),
            Error::MiddlewareContract { request, .. }
            | Error::Middleware { request, .. }
            | Error::UnsupportedBody { request }
            | Error::Transport { request, .. }
            | Error::Timeout { request, .. }
            | Error::Http { request, .. } => Some(request),
        }
    }

    /// Returns the final response for HTTP status failures.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Http { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status_code)
    }

    /// Returns `true` for the failures the retry controller may retry.
    ///
    /// Only transport errors qualify. Timeouts are terminal, and HTTP errors
    /// are raised after the retry budget for their status has been spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// A short name for the error kind, suitable for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "configuration",
            Error::MiddlewareContract { .. } => "middleware_contract",
            Error::Middleware { .. } => "middleware",
            Error::UnsupportedBody { .. } => "unsupported_body",
            Error::Transport { .. } => "transport",
            Error::Timeout { .. } => "timeout",
            Error::Http { .. } => "http",
        }
    }
}

/// A specialized `Result` type for HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
