//! Example demonstrating error handling with the classified taxonomy.
//!
//! This example shows how to:
//! - Branch on the error kind of a failed call
//! - Inspect HTTP status codes and validation details
//! - Check if errors are retryable
//! - Deal with deserialization and network failures
//!
//! Run with: `cargo run --example error_handling`

use serde::Deserialize;
use steadfast::{ApiError, Client, ErrorKind};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("steadfast=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== Example 1: Branching on the Error Kind ===");
    // Try to fetch a non-existent resource (404 error)
    match client.get::<Post>("/posts/999999").await {
        Ok(response) => println!("Success: {:?}", response.data),
        Err(e) => match e.kind {
            ErrorKind::NotFound => {
                println!("Not found!");
                println!("  Status: {:?}", e.status);
                println!("  Message: {}", e.message);
            }
            ErrorKind::Unauthorized => println!("Session expired, redirect to login"),
            ErrorKind::Validation => println!("Field errors: {:?}", e.details),
            _ => println!("Other error: {}", e),
        },
    }
    println!();

    println!("=== Example 2: Handling Deserialization Failures ===");
    // Define a struct that doesn't match the API response
    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    match client.get::<WrongSchema>("/posts/1").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => {
            println!("Deserialization failed!");
            println!("  Kind: {}", e.kind);
            println!("  Status: {:?}", e.status);
            println!("  Message: {}", e.message);
        }
    }
    println!();

    println!("=== Example 3: Checking Error Retryability ===");
    let errors = vec![
        ApiError::new(ErrorKind::Server, "Server error")
            .with_status(http::StatusCode::INTERNAL_SERVER_ERROR),
        ApiError::new(ErrorKind::Validation, "Bad request")
            .with_status(http::StatusCode::BAD_REQUEST),
        ApiError::new(ErrorKind::Timeout, "Request timed out"),
        ApiError::cancelled(),
    ];

    for error in errors {
        println!("Error: {}", error);
        println!("  Kind: {}", error.kind);
        println!("  Is retryable: {}", error.is_retryable());
        println!("  Status code: {:?}", error.status);
        println!();
    }

    println!("=== Example 4: Handling Network Errors ===");
    // Try to connect to a domain that doesn't resolve
    let bad_client = Client::builder()
        .base_url("https://this-domain-does-not-exist-12345.com")?
        .build()?;

    match bad_client.get::<serde_json::Value>("/").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => {
            println!("Error kind: {}", e.kind);
            println!("  Message: {}", e.message);
            println!("  Is retryable: {}", e.is_retryable());
        }
    }
    println!();

    println!("=== Example 5: A Generic Fallback Branch ===");
    match client.get::<Post>("/posts/999999").await {
        Ok(_) => {}
        Err(e) => {
            println!("Error occurred: {}", e);

            // Check if we could retry
            if e.is_retryable() {
                println!("  This error is retryable (5xx, timeout, or network issue)");
            } else {
                println!("  This error is NOT retryable (4xx or other permanent failure)");
            }

            if let Some(status) = e.status {
                println!("  HTTP status: {}", status);
            }

            if let Some(details) = &e.details {
                println!("  Structured payload: {}", details);
            }
        }
    }

    Ok(())
}
