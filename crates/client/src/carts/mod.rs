//! Carts service access.
//!
//! # Architecture
//!
//! - The carts service is the source of truth for cart contents
//! - [`CartClient`] is the seam the session talks through; tests swap in fakes
//! - [`HttpCartClient`] speaks the service's JSON API with `reqwest`
//!
//! # API
//!
//! | Operation | Request                | Body                 |
//! |-----------|------------------------|----------------------|
//! | create    | `POST {base}/carts`    | `{"username": ...}`  |
//! | fetch     | `GET {base}/carts/{id}`| -                    |
//! | update    | `PUT {base}/carts/{id}`| full cart            |
//!
//! Every operation answers with a cart record whose `items` may be `null`.

mod http;

pub use http::HttpCartClient;

use async_trait::async_trait;
use retail_cart_core::{Cart, CartId, RawCart};
use thiserror::Error;

/// Errors that can occur when talking to the carts service.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Cart does not exist on the service.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Remote cart operations.
///
/// Implementations return the record exactly as the service sent it;
/// normalization is the caller's job.
#[async_trait]
pub trait CartClient: Send + Sync {
    /// Create an empty cart owned by `username`.
    async fn create(&self, username: &str) -> Result<RawCart, CartServiceError>;

    /// Fetch a cart by ID.
    ///
    /// Some deployments answer an unknown ID with a cart carrying a
    /// different ID instead of a 404; callers must compare IDs.
    async fn fetch(&self, id: &CartId) -> Result<RawCart, CartServiceError>;

    /// Replace a cart's contents and return the stored result.
    async fn update(&self, cart: &Cart) -> Result<RawCart, CartServiceError>;
}
