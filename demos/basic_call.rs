//! Basic example demonstrating GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with a base URL and defaults
//! - Make GET requests and read JSON bodies
//! - Make POST requests with JSON bodies
//! - Pass query parameters and per-call options
//!
//! Run with: `cargo run --example basic_call`

use courier::{Client, Error, RequestOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .timeout(Duration::from_secs(5))
        .default_header("User-Agent", "courier-demo/0.1")?
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get("/posts/1").await?;
    match response.json::<Post>() {
        Ok(post) => {
            println!("Post ID: {}", post.id);
            println!("Title: {}", post.title);
        }
        Err(e) => println!("Body was not a post: {}", e),
    }
    println!("Status: {} {}", response.status_code.as_u16(), response.status_text);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let response = client.post("/posts", &new_post).await?;
    println!("Created: {:?}", response.body);
    println!();

    println!("=== Query Parameters ===");
    let options = RequestOptions::new()
        .with_param("userId", "1")
        .with_max_retries(2);
    let response = client.request(http::Method::GET, "/posts", options).await?;
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());
    println!("Was redirected: {}", response.was_redirected());

    Ok(())
}
