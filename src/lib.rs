//! # Courier - an HTTP client with retries, redirects and middleware
//!
//! Courier layers redirect following, retries with jittered exponential
//! backoff, and a two-phase middleware pipeline over a plain `reqwest`
//! transport. Every call returns a uniform [`Response`] or an [`Error`] that
//! carries a snapshot of the request that failed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier::{Client, RequestOptions};
//! use serde::Serialize;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(5))
//!         .max_retries(3)
//!         .retry_delays(Duration::from_millis(100), Duration::from_secs(2))
//!         .build()?;
//!
//!     let user = client.get("/users/123").await?;
//!     println!("{} {}: {:?}", user.status_code, user.status_text, user.body);
//!
//!     let created = client
//!         .post("/users", &CreateUser { name: "Alice".to_string() })
//!         .await?;
//!     println!("Created after {} retries", created.retries);
//!
//!     let page = client
//!         .request(
//!             http::Method::GET,
//!             "/users",
//!             RequestOptions::new().with_param("page", "2").with_max_redirects(0),
//!         )
//!         .await?;
//!     println!("{}", page.text());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How a call proceeds
//!
//! 1. The options are merged with the client defaults and a [`Context`] is
//!    built; query parameters are appended to the URL.
//! 2. Before-phase [`Middleware`] runs. A handler may short-circuit by
//!    producing a response, in which case nothing is sent.
//! 3. The request is dispatched. A timeout ends the call immediately. A
//!    transport error is retried while the retry budget lasts.
//! 4. A 3xx response with a `Location` is followed while the redirect budget
//!    lasts. A 5xx response is retried while the retry budget lasts. Both
//!    budgets span the whole call.
//! 5. After-phase middleware runs on the result. Final statuses of 400 and
//!    above become [`Error::Http`].
//!
//! ## Middleware
//!
//! ```no_run
//! use courier::{Client, Context, Response, Step};
//! use courier::error::BoxError;
//! use std::time::{SystemTime, UNIX_EPOCH};
//!
//! # fn example() -> Result<(), courier::Error> {
//! let client = Client::builder()
//!     .before(|mut ctx: Context, _: Option<Response>| async move {
//!         let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;
//!         ctx.set_meta("started_ms", now);
//!         Ok::<_, BoxError>(Step::Continue(ctx))
//!     })
//!     .after(|ctx: Context, result: Option<Response>| async move {
//!         let mut result = result.ok_or("after-phase handler called without a result")?;
//!         result.meta.insert("traced".into(), true.into());
//!         Ok::<_, BoxError>(Step::Produce(ctx, result))
//!     })
//!     .on_middleware_error(|error, ctx, phase| {
//!         eprintln!("{} handler failed for {}: {}", phase, ctx.url, error);
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! Request bodies are JSON values or text; streaming bodies are rejected.
//! The only cancellation is the per-attempt timeout: each attempt gets the
//! full budget and there is no deadline across a retry or redirect chain.

mod client;
pub mod config;
mod context;
pub mod error;
pub mod middleware;
pub mod options;
pub mod redirect;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use context::Context;
pub use error::{Error, RequestSnapshot, Result};
pub use middleware::{Integration, Middleware, Phase, Step};
pub use options::{Body, RequestOptions};
pub use response::{Response, ResponseBody};
