//! Basic example demonstrating GET and POST requests with caching.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Make GET requests and observe the response cache at work
//! - Make POST requests to create data
//! - Access response data and metadata
//!
//! Run with: `cargo run --example basic_call`

use serde::{Deserialize, Serialize};
use std::time::Duration;
use steadfast::{ApiError, Client};

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
async fn main() -> Result<(), ApiError> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("steadfast=debug,basic_call=info")
        .init();

    // Create a client for the JSONPlaceholder API
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .timeout(Duration::from_secs(10))
        .cache_ttl(Duration::from_secs(60))
        .build()?;

    println!("=== GET Request Example ===");
    // Make a GET request to fetch a post
    let response = client.get::<Post>("/posts/1").await?;

    println!("Post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!("From cache: {}", response.from_cache);
    println!();

    println!("=== Cached GET Example ===");
    // The same request again is served from the cache without a network call
    let cached = client.get::<Post>("/posts/1").await?;

    println!("Title: {}", cached.data.title);
    println!("Request latency: {:?}", cached.latency);
    println!("From cache: {}", cached.from_cache);
    println!("Network attempts: {}", cached.attempts);
    println!();

    println!("=== POST Request Example ===");
    // Make a POST request to create a new post
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = client.post::<_, Post>("/posts", &new_post).await?;

    println!("Created post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!();

    println!("=== Accessing Response Metadata ===");
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
