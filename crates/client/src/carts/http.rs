//! HTTP implementation of [`CartClient`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use retail_cart_core::{Cart, CartId, RawCart};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CartClient, CartServiceError};
use crate::config::CartsServiceConfig;

/// Longest slice of a response body copied into logs and errors.
const BODY_EXCERPT_CHARS: usize = 500;

#[derive(Serialize)]
struct CreateCartRequest<'a> {
    username: &'a str,
}

/// Client for the carts service JSON API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpCartClient {
    /// Create a new carts service client.
    #[must_use]
    pub fn new(config: &CartsServiceConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &CartsServiceConfig) -> Self {
        Self {
            inner: Arc::new(HttpCartClientInner {
                client,
                base_url: config.base_url.clone(),
                api_token: config.bearer_token().map(str::to_string),
            }),
        }
    }

    /// `{base}/carts`
    fn carts_url(&self) -> Result<Url, CartServiceError> {
        Ok(self.inner.base_url.join("carts")?)
    }

    /// `{base}/carts/{id}`, with the ID percent-encoded as one path segment.
    fn cart_url(&self, id: &CartId) -> Result<Url, CartServiceError> {
        let mut url = self.carts_url()?;
        url.path_segments_mut()
            .map_err(|()| CartServiceError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(id.as_str());
        Ok(url)
    }

    /// Send a request and decode a cart record from the response.
    async fn execute(&self, request: RequestBuilder) -> Result<RawCart, CartServiceError> {
        let request = match &self.inner.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CartServiceError::RateLimited(retry_after));
        }

        let url = response.url().to_string();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;
        let excerpt: String = response_text.chars().take(BODY_EXCERPT_CHARS).collect();

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Carts service returned 404");
            return Err(CartServiceError::NotFound(url));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt,
                "Carts service returned non-success status"
            );
            return Err(CartServiceError::Api {
                status: status.as_u16(),
                message: excerpt,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt,
                "Failed to parse carts service response"
            );
            CartServiceError::Parse(e)
        })
    }
}

#[async_trait]
impl CartClient for HttpCartClient {
    #[instrument(skip(self))]
    async fn create(&self, username: &str) -> Result<RawCart, CartServiceError> {
        let request = self
            .inner
            .client
            .post(self.carts_url()?)
            .json(&CreateCartRequest { username });
        self.execute(request).await
    }

    #[instrument(skip(self), fields(cart_id = %id))]
    async fn fetch(&self, id: &CartId) -> Result<RawCart, CartServiceError> {
        let request = self.inner.client.get(self.cart_url(id)?);
        self.execute(request).await
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id, lines = cart.items.len()))]
    async fn update(&self, cart: &Cart) -> Result<RawCart, CartServiceError> {
        let request = self.inner.client.put(self.cart_url(&cart.id)?).json(cart);
        self.execute(request).await
    }
}
