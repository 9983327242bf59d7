//! Before/after middleware and the chain executor.
//!
//! A handler receives the current [`Context`] and, in the after phase, the
//! current [`Response`]. It answers with a [`Step`]:
//!
//! - [`Step::Continue`] hands the (possibly modified) context to the next
//!   handler. Only valid in the before phase.
//! - [`Step::Produce`] supplies a response. In the before phase this
//!   short-circuits the chain: no further before-handlers run and the
//!   transport is skipped for that attempt. In the after phase it forwards the
//!   response to the next handler; the last one wins.
//!
//! Any handler failure is reported to the optional [`ErrorObserver`] and then
//! aborts the call. Middleware failures are never retried.
//!
//! # Examples
//!
//! ```
//! use courier::{Client, Context, Response, Step};
//! use courier::error::BoxError;
//!
//! # fn example() -> Result<(), courier::Error> {
//! let client = Client::builder()
//!     .before(|mut ctx: Context, _: Option<Response>| async move {
//!         ctx.set_meta("traced", true);
//!         Ok::<_, BoxError>(Step::Continue(ctx))
//!     })
//!     .after(|ctx: Context, result: Option<Response>| async move {
//!         let result = result.ok_or("after-phase handler called without a result")?;
//!         Ok::<_, BoxError>(Step::Produce(ctx, result))
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::{error::BoxError, Context, Error, Response, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The two middleware stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs before dispatch.
    Before,
    /// Runs once a response exists.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before"),
            Phase::After => f.write_str("after"),
        }
    }
}

/// What a handler hands to the next stage.
#[derive(Debug, Clone)]
pub enum Step {
    /// Continue with this context and no result.
    Continue(Context),
    /// Continue with this context and this result.
    Produce(Context, Response),
}

/// A before or after handler.
///
/// Closures of the shape `Fn(Context, Option<Response>) -> impl Future<Output =
/// Result<Step, BoxError>>` implement this trait directly.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handles one stage. `result` is `None` in the before phase.
    async fn handle(
        &self,
        ctx: Context,
        result: Option<Response>,
    ) -> std::result::Result<Step, BoxError>;
}

#[async_trait]
impl<F, Fut> Middleware for F
where
    F: Fn(Context, Option<Response>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Step, BoxError>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: Context,
        result: Option<Response>,
    ) -> std::result::Result<Step, BoxError> {
        (self)(ctx, result).await
    }
}

/// Observer notified of every middleware failure, with the context the
/// failing handler received. It cannot alter the outcome.
pub type ErrorObserver = Arc<dyn Fn(&Error, &Context, Phase) + Send + Sync>;

/// A before and/or after handler registered together.
#[derive(Clone, Default)]
pub struct Integration {
    pub(crate) before: Option<Arc<dyn Middleware>>,
    pub(crate) after: Option<Arc<dyn Middleware>>,
}

impl Integration {
    /// Creates an empty integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the before handler.
    pub fn before(mut self, handler: impl Middleware + 'static) -> Self {
        self.before = Some(Arc::new(handler));
        self
    }

    /// Sets the after handler.
    pub fn after(mut self, handler: impl Middleware + 'static) -> Self {
        self.after = Some(Arc::new(handler));
        self
    }
}

/// Result of the before phase.
pub(crate) enum BeforeOutcome {
    /// Proceed to the transport with this context.
    Dispatch(Context),
    /// A handler supplied the response; skip the transport.
    ShortCircuit(Context, Response),
}

/// The registered handlers, fixed when the client is built.
#[derive(Clone, Default)]
pub(crate) struct Chain {
    before: Vec<Arc<dyn Middleware>>,
    after: Vec<Arc<dyn Middleware>>,
    observer: Option<ErrorObserver>,
}

impl Chain {
    pub(crate) fn push(&mut self, phase: Phase, handler: Arc<dyn Middleware>) {
        match phase {
            Phase::Before => self.before.push(handler),
            Phase::After => self.after.push(handler),
        }
    }

    pub(crate) fn set_observer(&mut self, observer: ErrorObserver) {
        self.observer = Some(observer);
    }

    pub(crate) fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Before => self.before.len(),
            Phase::After => self.after.len(),
        }
    }

    pub(crate) async fn run_before(&self, mut ctx: Context, attempt: usize) -> Result<BeforeOutcome> {
        for handler in &self.before {
            let received = ctx.clone();
            match handler.handle(ctx, None).await {
                Ok(Step::Continue(next)) => ctx = next,
                Ok(Step::Produce(next, result)) => {
                    tracing::debug!(url = %next.url, "Before-phase handler short-circuited the request");
                    return Ok(BeforeOutcome::ShortCircuit(next, result));
                }
                Err(source) => {
                    let error = Error::Middleware {
                        phase: Phase::Before,
                        source,
                        request: Box::new(received.snapshot(attempt)),
                    };
                    return Err(self.report(error, &received, Phase::Before));
                }
            }
        }
        Ok(BeforeOutcome::Dispatch(ctx))
    }

    pub(crate) async fn run_after(
        &self,
        mut ctx: Context,
        mut result: Response,
        attempt: usize,
    ) -> Result<(Context, Response)> {
        for handler in &self.after {
            let received = ctx.clone();
            match handler.handle(ctx, Some(result)).await {
                Ok(Step::Produce(next, produced)) => {
                    ctx = next;
                    result = produced;
                }
                Ok(Step::Continue(_)) => {
                    let error = Error::MiddlewareContract {
                        phase: Phase::After,
                        message: "after-phase handler did not forward a result".to_string(),
                        request: Box::new(received.snapshot(attempt)),
                    };
                    return Err(self.report(error, &received, Phase::After));
                }
                Err(source) => {
                    let error = Error::Middleware {
                        phase: Phase::After,
                        source,
                        request: Box::new(received.snapshot(attempt)),
                    };
                    return Err(self.report(error, &received, Phase::After));
                }
            }
        }
        Ok((ctx, result))
    }

    fn report(&self, error: Error, ctx: &Context, phase: Phase) -> Error {
        tracing::warn!(
            error = %error,
            phase = %phase,
            method = %ctx.method,
            url = %ctx.url,
            "Middleware failed"
        );
        if let Some(observer) = &self.observer {
            observer(&error, ctx, phase);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Defaults, RequestOptions};
    use crate::response::ResponseBody;
    use http::{HeaderMap, Method, StatusCode};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> Context {
        Context::build(
            Method::GET,
            "http://example.com/",
            None,
            RequestOptions::new().resolve(&Defaults::default()),
            HashMap::new(),
        )
        .unwrap()
    }

    fn response(status: StatusCode) -> Response {
        Response::new(status, HeaderMap::new(), ResponseBody::Text(String::new()))
    }

    fn tagger(tag: &'static str) -> Arc<dyn Middleware> {
        Arc::new(move |mut ctx: Context, _: Option<Response>| async move {
            let mut seen = ctx
                .meta("order")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            seen.push_str(tag);
            ctx.set_meta("order", seen);
            Ok::<_, BoxError>(Step::Continue(ctx))
        })
    }

    #[tokio::test]
    async fn test_before_threads_context_in_order() {
        let mut chain = Chain::default();
        chain.push(Phase::Before, tagger("a"));
        chain.push(Phase::Before, tagger("b"));

        match chain.run_before(ctx(), 0).await.unwrap() {
            BeforeOutcome::Dispatch(ctx) => {
                assert_eq!(ctx.meta("order"), Some(&serde_json::json!("ab")));
            }
            BeforeOutcome::ShortCircuit(..) => panic!("unexpected short-circuit"),
        }
    }

    #[tokio::test]
    async fn test_before_short_circuit_stops_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut chain = Chain::default();
        chain.push(
            Phase::Before,
            Arc::new(|ctx: Context, _: Option<Response>| async move {
                Ok::<_, BoxError>(Step::Produce(ctx, response(StatusCode::ACCEPTED)))
            }),
        );
        chain.push(
            Phase::Before,
            Arc::new(move |ctx: Context, _: Option<Response>| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, BoxError>(Step::Continue(ctx)) }
            }),
        );

        match chain.run_before(ctx(), 0).await.unwrap() {
            BeforeOutcome::ShortCircuit(_, result) => {
                assert_eq!(result.status_code, StatusCode::ACCEPTED)
            }
            BeforeOutcome::Dispatch(_) => panic!("expected short-circuit"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_after_last_result_wins() {
        let mut chain = Chain::default();
        chain.push(
            Phase::After,
            Arc::new(|ctx: Context, result: Option<Response>| async move {
                let mut result = result.ok_or("missing result")?;
                result.status_code = StatusCode::CREATED;
                Ok::<_, BoxError>(Step::Produce(ctx, result))
            }),
        );
        chain.push(
            Phase::After,
            Arc::new(|ctx: Context, result: Option<Response>| async move {
                let mut result = result.ok_or("missing result")?;
                result
                    .meta
                    .insert("seen".into(), result.status_code.as_u16().into());
                Ok::<_, BoxError>(Step::Produce(ctx, result))
            }),
        );

        let (_, result) = chain
            .run_after(ctx(), response(StatusCode::OK), 0)
            .await
            .unwrap();
        assert_eq!(result.status_code, StatusCode::CREATED);
        assert_eq!(result.meta.get("seen"), Some(&serde_json::json!(201)));
    }

    #[tokio::test]
    async fn test_after_without_result_violates_contract_and_is_observed() {
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = observed.clone();

        let mut chain = Chain::default();
        chain.push(
            Phase::After,
            Arc::new(|ctx: Context, _: Option<Response>| async move {
                Ok::<_, BoxError>(Step::Continue(ctx))
            }),
        );
        chain.set_observer(Arc::new(move |error: &Error, _: &Context, phase: Phase| {
            assert!(matches!(error, Error::MiddlewareContract { .. }));
            assert_eq!(phase, Phase::After);
            observed_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let result = chain.run_after(ctx(), response(StatusCode::OK), 3).await;
        match result {
            Err(Error::MiddlewareContract { phase, request, .. }) => {
                assert_eq!(phase, Phase::After);
                assert_eq!(request.attempt, 3);
            }
            other => panic!("Expected MiddlewareContract, got {:?}", other.map(|_| ())),
        }
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_propagates_with_source() {
        let mut chain = Chain::default();
        chain.push(
            Phase::Before,
            Arc::new(|_: Context, _: Option<Response>| async move {
                Err::<Step, BoxError>("token refresh failed".into())
            }),
        );

        match chain.run_before(ctx(), 0).await {
            Err(Error::Middleware { phase, source, .. }) => {
                assert_eq!(phase, Phase::Before);
                assert_eq!(source.to_string(), "token refresh failed");
            }
            Err(other) => panic!("Expected Middleware error, got {:?}", other),
            Ok(_) => panic!("Expected Middleware error"),
        }
    }

    #[test]
    fn test_integration_registers_both_phases() {
        let integration = Integration::new()
            .before(|ctx: Context, _: Option<Response>| async move {
                Ok::<_, BoxError>(Step::Continue(ctx))
            })
            .after(|ctx: Context, result: Option<Response>| async move {
                let result = result.ok_or("missing result")?;
                Ok::<_, BoxError>(Step::Produce(ctx, result))
            });

        let mut chain = Chain::default();
        if let Some(before) = integration.before {
            chain.push(Phase::Before, before);
        }
        if let Some(after) = integration.after {
            chain.push(Phase::After, after);
        }
        assert_eq!(chain.len(Phase::Before), 1);
        assert_eq!(chain.len(Phase::After), 1);
    }
}
