//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Match on the different error kinds
//! - Inspect the response carried by an HTTP error
//! - Read the request snapshot attached to every call error
//! - Tell retryable errors apart
//!
//! Run with: `cargo run --example error_handling`

use courier::{Client, Error, RequestOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .max_retries(1)
        .retry_delays(Duration::from_millis(100), Duration::from_millis(500))
        .build()?;

    println!("=== Example 1: HTTP Errors ===");
    match client.get("/posts/999999").await {
        Ok(response) => println!("Success: {:?}", response.body),
        Err(Error::Http { response, request }) => {
            println!("HTTP Error!");
            println!("  Status: {} {}", response.status_code.as_u16(), response.status_text);
            println!("  Is client error (4xx): {}", response.status_code.is_client_error());
            println!("  Body: {}", response.text());
            println!("  Request: {} {} (attempt {})", request.method, request.url, request.attempt);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Timeouts ===");
    let options = RequestOptions::new().with_timeout(Duration::from_millis(1));
    match client.request(http::Method::GET, "/posts", options).await {
        Ok(_) => println!("Unexpectedly fast"),
        Err(Error::Timeout { timeout, request }) => {
            println!("Timed out after {:?} on attempt {}", timeout, request.attempt);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 3: Transport Errors ===");
    let unreachable = Client::builder()
        .max_retries(2)
        .retry_delays(Duration::from_millis(50), Duration::from_millis(200))
        .build()?;
    match unreachable.get("http://127.0.0.1:9/").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => {
            println!("Error kind: {}", e.kind());
            println!("Retryable: {}", e.is_retryable());
            if let Some(request) = e.request() {
                println!("Gave up at attempt {}", request.attempt);
            }
        }
    }
    println!();

    println!("=== Example 4: Configuration Errors ===");
    // Relative URLs need a base URL.
    match unreachable.get("/posts").await {
        Err(e @ Error::Configuration { .. }) => println!("Configuration error: {}", e),
        other => println!("Unexpected: {:?}", other.map(|r| r.status_code)),
    }

    Ok(())
}
