//! Example demonstrating before/after middleware.
//!
//! This example shows how to:
//! - Add headers and metadata in a before-phase handler
//! - Serve cached responses by short-circuiting the transport
//! - Post-process responses in an after-phase handler
//! - Observe middleware failures
//!
//! Run with: `cargo run --example middleware`

use courier::error::BoxError;
use courier::{Client, Context, Integration, Response, ResponseBody, Step};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,middleware=info")
        .init();

    let timing = Integration::new()
        .before(|mut ctx: Context, _: Option<Response>| async move {
            ctx.options
                .headers
                .insert("x-request-source", HeaderValue::from_static("courier-demo"));
            let path = ctx.url.path().to_string();
            ctx.set_meta("path", path);
            Ok::<_, BoxError>(Step::Continue(ctx))
        })
        .after(|ctx: Context, result: Option<Response>| async move {
            let mut result = result.ok_or("after-phase handler called without a result")?;
            if let Some(path) = ctx.meta("path").cloned() {
                result.meta.insert("path".into(), path);
            }
            Ok::<_, BoxError>(Step::Produce(ctx, result))
        });

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .integration(timing)
        .before(|ctx: Context, _: Option<Response>| async move {
            if ctx.url.path() == "/cached" {
                let cached = Response::new(
                    StatusCode::OK,
                    HeaderMap::new(),
                    ResponseBody::Json(serde_json::json!({"cached": true})),
                );
                return Ok::<_, BoxError>(Step::Produce(ctx, cached));
            }
            Ok(Step::Continue(ctx))
        })
        .on_middleware_error(|error, ctx, phase| {
            eprintln!("{} handler failed for {}: {}", phase, ctx.url, error);
        })
        .build()?;

    println!("=== Network Request ===");
    let started = Instant::now();
    let response = client.get("/posts/1").await?;
    println!("Status: {}", response.status_code.as_u16());
    println!("Meta: {:?}", response.meta);
    println!("Took: {:?}", started.elapsed());
    println!();

    println!("=== Cached Request ===");
    let started = Instant::now();
    let response = client.get("/cached").await?;
    println!("Body: {:?}", response.body);
    println!("Took: {:?}", started.elapsed());

    Ok(())
}
