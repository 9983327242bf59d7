//! HTTP client with retries, redirect following and middleware.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    config::ClientConfig,
    middleware::{BeforeOutcome, Chain, ErrorObserver, Integration, Middleware, Phase},
    options::{parse_header, Defaults, RequestOptions, ResolvedOptions},
    redirect::redirect_target,
    retry::{RetryPolicy, RetryTrigger},
    transport::{Outcome, Transport},
    Context, Error, RequestSnapshot, Response, Result,
};
use http::{HeaderMap, Method};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client that follows redirects, retries transient failures and runs
/// middleware around every dispatch.
///
/// The client is cheap to clone and meant to be reused. Its configuration,
/// including registered middleware, is fixed when it is built, so concurrent
/// calls never observe a half-registered chain.
///
/// # Examples
///
/// ```no_run
/// use courier::{Client, RequestOptions};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), courier::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(5))
///     .max_retries(2)
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
///
/// let users = client.get("/users").await?;
/// println!("{} {} after {} retries", users.status_code, users.status_text, users.retries);
///
/// let options = RequestOptions::new().with_param("page", "2");
/// let page = client.request(http::Method::GET, "/users", options).await?;
/// println!("{:?}", page.body);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Transport,
    base_url: Option<Url>,
    defaults: Defaults,
    chain: Chain,
}

/// Where the next layer of a call goes. Carried across retries and redirects.
struct CallState {
    method: Method,
    target: String,
    options: ResolvedOptions,
    meta: HashMap<String, serde_json::Value>,
    attempt: usize,
    redirects: usize,
}

impl CallState {
    fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.clone(),
            url: self.target.clone(),
            options: self.options.clone(),
            attempt: self.attempt,
        }
    }

    /// Continue from what middleware left in `ctx`.
    fn carry(&mut self, ctx: &Context) {
        self.options = ctx.options.clone();
        self.meta = ctx.meta.clone();
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from serialized defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not a valid
    /// [`ClientConfig`] or holds invalid headers or URLs.
    pub fn from_config(value: serde_json::Value) -> Result<Self> {
        ClientBuilder::from_config(ClientConfig::from_value(value)?)?.build()
    }

    /// The client-level defaults.
    pub fn defaults(&self) -> &Defaults {
        &self.inner.defaults
    }

    /// Makes a request.
    ///
    /// This drives the whole pipeline: the context is built, the before
    /// phase runs, the request is dispatched, redirects are followed and
    /// failures retried as configured, and the after phase runs on the
    /// result.
    ///
    /// Redirect hops and retries run as a loop, one attempt in flight at a
    /// time. The retry budget is shared by the whole redirect chain. Every
    /// redirect layer runs its own after phase as the chain unwinds, so an
    /// after-handler fires once per hop.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the final status is 400 or above.
    /// - [`Error::Transport`] once transport errors exhaust the retry budget.
    /// - [`Error::Timeout`] as soon as an attempt times out.
    /// - [`Error::Middleware`] / [`Error::MiddlewareContract`] if a handler fails.
    /// - [`Error::UnsupportedBody`] for streaming bodies.
    /// - [`Error::Configuration`] if the URL does not resolve.
    pub async fn request(
        &self,
        method: Method,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<Response> {
        let mut call = CallState {
            method,
            target: url.as_ref().to_string(),
            options: options.resolve(&self.inner.defaults),
            meta: HashMap::new(),
            attempt: 0,
            redirects: 0,
        };
        // Redirect layers still owed an after phase, outermost first.
        let mut pending: Vec<(Context, usize)> = Vec::new();

        loop {
            let ctx = Context::build(
                call.method.clone(),
                &call.target,
                self.inner.base_url.as_ref(),
                call.options.clone(),
                call.meta.clone(),
            )
            .map_err(|e| e.with_request(call.snapshot()))?;

            let ctx = match self.inner.chain.run_before(ctx, call.attempt).await? {
                BeforeOutcome::Dispatch(ctx) => ctx,
                BeforeOutcome::ShortCircuit(ctx, result) => {
                    let (_, result) = self.inner.chain.run_after(ctx, result, call.attempt).await?;
                    return self.unwind(pending, result, call.redirects).await;
                }
            };

            let policy = RetryPolicy::from_options(&ctx.options);
            let started = Instant::now();

            match self.inner.transport.dispatch(&ctx, call.attempt).await? {
                Outcome::TimedOut(timeout) => {
                    tracing::warn!(
                        method = %ctx.method,
                        url = %ctx.url,
                        timeout_ms = timeout.as_millis() as u64,
                        attempt = call.attempt,
                        "Request timed out"
                    );
                    return Err(Error::Timeout {
                        timeout,
                        request: Box::new(ctx.snapshot(call.attempt)),
                    });
                }
                Outcome::Failed(source) => {
                    tracing::warn!(
                        error = %source,
                        method = %ctx.method,
                        url = %ctx.url,
                        attempt = call.attempt,
                        "Request failed"
                    );

                    if policy.should_retry(RetryTrigger::Transport, call.attempt) {
                        wait_before_retry(&policy, &ctx, call.attempt).await;
                        call.carry(&ctx);
                        call.attempt += 1;
                        continue;
                    }

                    return Err(Error::Transport {
                        source,
                        request: Box::new(ctx.snapshot(call.attempt)),
                    });
                }
                Outcome::Completed(completion) => {
                    let response = Response::normalize(
                        completion,
                        call.attempt,
                        call.redirects,
                        ctx.meta.clone(),
                    );

                    tracing::info!(
                        status = response.status_code.as_u16(),
                        latency_ms = started.elapsed().as_millis() as u64,
                        attempt = call.attempt,
                        redirects = call.redirects,
                        "Received HTTP response"
                    );

                    if let Some(next) = redirect_target(
                        &response,
                        &ctx.url,
                        call.redirects,
                        ctx.options.max_redirects,
                    ) {
                        tracing::info!(
                            status = response.status_code.as_u16(),
                            from = %ctx.url,
                            to = %next,
                            hop = call.redirects + 1,
                            "Following redirect"
                        );
                        call.carry(&ctx);
                        call.target = next.to_string();
                        call.redirects += 1;
                        pending.push((ctx, call.attempt));
                        continue;
                    }

                    if policy.should_retry(RetryTrigger::Status(response.status_code), call.attempt) {
                        tracing::warn!(
                            status = response.status_code.as_u16(),
                            attempt = call.attempt,
                            "Server error (5xx)"
                        );
                        wait_before_retry(&policy, &ctx, call.attempt).await;
                        call.carry(&ctx);
                        call.attempt += 1;
                        continue;
                    }

                    let (ctx, result) = self
                        .inner
                        .chain
                        .run_after(ctx, response, call.attempt)
                        .await?;

                    if result.status_code.as_u16() >= 400 {
                        if result.status_code.is_client_error() {
                            tracing::error!(status = result.status_code.as_u16(), "Client error (4xx)");
                        } else {
                            tracing::error!(
                                status = result.status_code.as_u16(),
                                attempt = call.attempt,
                                "Server error (5xx), giving up"
                            );
                        }
                        return Err(Error::Http {
                            response: Box::new(result),
                            request: Box::new(ctx.snapshot(call.attempt)),
                        });
                    }

                    return self.unwind(pending, result, call.redirects).await;
                }
            }
        }
    }

    /// Runs the after phase of every redirect layer, innermost first.
    async fn unwind(
        &self,
        pending: Vec<(Context, usize)>,
        mut result: Response,
        hops: usize,
    ) -> Result<Response> {
        for (ctx, attempt) in pending.into_iter().rev() {
            result.redirects = hops;
            let (_, next) = self.inner.chain.run_after(ctx, result, attempt).await?;
            result = next;
        }
        Ok(result)
    }

    /// Makes a request with default options.
    pub async fn send(&self, method: Method, url: impl AsRef<str>) -> Result<Response> {
        self.request(method, url, RequestOptions::new()).await
    }

    /// Makes a GET request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), courier::Error> {
    /// let client = courier::Client::builder().build()?;
    /// let response = client.get("https://api.example.com/users/123").await?;
    /// let user: serde_json::Value = response.json().expect("user json");
    /// println!("User: {}", user["name"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::GET, url).await
    }

    /// Makes a HEAD request.
    pub async fn head(&self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::HEAD, url).await
    }

    /// Makes a DELETE request.
    pub async fn delete(&self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::DELETE, url).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B>(&self, url: impl AsRef<str>, body: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.with_json(Method::POST, url, body).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B>(&self, url: impl AsRef<str>, body: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.with_json(Method::PUT, url, body).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<B>(&self, url: impl AsRef<str>, body: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.with_json(Method::PATCH, url, body).await
    }

    async fn with_json<B>(&self, method: Method, url: impl AsRef<str>, body: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let options = RequestOptions::new().with_json(body).map_err(|e| {
            e.with_request(RequestSnapshot {
                method: method.clone(),
                url: url.as_ref().to_string(),
                options: RequestOptions::new().resolve(&self.inner.defaults),
                attempt: 0,
            })
        })?;
        self.request(method, url, options).await
    }
}

async fn wait_before_retry(policy: &RetryPolicy, ctx: &Context, attempt: usize) {
    let delay = policy.delay_for_attempt(attempt);
    tracing::info!(
        delay_ms = delay.as_millis() as u64,
        attempt = attempt,
        max_retries = policy.max_retries,
        url = %ctx.url,
        "Retrying request after delay"
    );
    tokio::time::sleep(delay).await;
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use courier::{ClientBuilder, Context, Integration, Response, Step};
/// use courier::error::BoxError;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), courier::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .max_redirects(5)
///     .max_retries(3)
///     .retry_delays(Duration::from_millis(100), Duration::from_secs(2))
///     .default_header("User-Agent", "my-app/1.0")?
///     .integration(Integration::new().before(|ctx: Context, _: Option<Response>| async move {
///         Ok::<_, BoxError>(Step::Continue(ctx))
///     }))
///     .on_middleware_error(|error, ctx, phase| {
///         eprintln!("{} middleware failed for {}: {}", phase, ctx.url, error);
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    defaults: Defaults,
    chain: Chain,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            defaults: Defaults::default(),
            chain: Chain::default(),
        }
    }

    /// Creates a builder from serialized defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or a header is invalid.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Self::new();

        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url)?;
        }
        for (name, value) in &config.headers {
            builder = builder.default_header(name, value)?;
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        if let Some(redirects) = config.redirects {
            builder = builder.max_redirects(redirects);
        }
        if let Some(retries) = config.retries {
            builder = builder.max_retries(retries);
        }
        if let Some(base) = config.base_retry_delay {
            builder = builder.base_retry_delay(Duration::from_millis(base));
        }
        if let Some(max) = config.max_retry_delay {
            builder = builder.max_retry_delay(Duration::from_millis(max));
        }

        Ok(builder)
    }

    /// Sets the base URL that relative request URLs are resolved against.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not http(s).
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::configuration(format!("Invalid base URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "Unsupported base URL scheme: {}",
                url.scheme()
            )));
        }
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.defaults.headers.insert(name, value);
        Ok(self)
    }

    /// Adds several default headers. Later values replace earlier ones of the
    /// same name.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.defaults.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Sets the per-attempt timeout. `Duration::ZERO` disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = timeout;
        self
    }

    /// Sets the maximum number of redirect hops.
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.defaults.max_redirects = max_redirects;
        self
    }

    /// Sets the number of retries beyond the first attempt.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.defaults.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry. Later retries double it.
    pub fn base_retry_delay(mut self, delay: Duration) -> Self {
        self.defaults.base_retry_delay = delay;
        self
    }

    /// Sets the ceiling for a single backoff delay.
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.defaults.max_retry_delay = delay;
        self
    }

    /// Sets the base delay and the ceiling for retry backoff.
    pub fn retry_delays(self, base: Duration, max: Duration) -> Self {
        self.base_retry_delay(base).max_retry_delay(max)
    }

    /// Registers a handler for `phase`. Handlers run in registration order.
    pub fn middleware(mut self, phase: Phase, handler: impl Middleware + 'static) -> Self {
        self.chain.push(phase, Arc::new(handler));
        self
    }

    /// Registers a before-phase handler.
    pub fn before(self, handler: impl Middleware + 'static) -> Self {
        self.middleware(Phase::Before, handler)
    }

    /// Registers an after-phase handler.
    pub fn after(self, handler: impl Middleware + 'static) -> Self {
        self.middleware(Phase::After, handler)
    }

    /// Registers a before/after pair.
    pub fn integration(mut self, integration: Integration) -> Self {
        if let Some(before) = integration.before {
            self.chain.push(Phase::Before, before);
        }
        if let Some(after) = integration.after {
            self.chain.push(Phase::After, after);
        }
        self
    }

    /// Sets the observer notified of middleware failures. Replaces any
    /// previous observer.
    pub fn on_middleware_error<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Error, &Context, Phase) + Send + Sync + 'static,
    {
        let observer: ErrorObserver = Arc::new(observer);
        self.chain.set_observer(observer);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        let transport = Transport::new()?;

        tracing::debug!(
            base_url = ?self.base_url.as_ref().map(Url::as_str),
            timeout_ms = self.defaults.timeout.as_millis() as u64,
            max_redirects = self.defaults.max_redirects,
            max_retries = self.defaults.max_retries,
            before_handlers = self.chain.len(Phase::Before),
            after_handlers = self.chain.len(Phase::After),
            "Built HTTP client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url: self.base_url,
                defaults: self.defaults,
                chain: self.chain,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
