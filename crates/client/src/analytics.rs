//! Add-to-cart analytics.
//!
//! Sinks are fire-and-forget: a failing collector is logged and never fails
//! the cart operation that produced the event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retail_cart_core::{Cart, CartId, Experiment, Product, ProductId, User, UserId};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AnalyticsConfig;

/// Event name sent to collectors.
pub const PRODUCT_ADDED_EVENT: &str = "ProductAdded";

/// A product was added to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAddedToCart {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub user_id: UserId,
    pub username: String,
    pub cart_id: CartId,
    /// Units across the whole cart after the add.
    pub cart_quantity: u64,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Units of this product in the cart after the add.
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<Experiment>,
}

impl ProductAddedToCart {
    /// Build an event stamped with a fresh ID and the current time.
    #[must_use]
    pub fn new(
        user: &User,
        cart: &Cart,
        product: &Product,
        quantity: u32,
        feature: Option<&str>,
        experiment: Option<&Experiment>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            cart_id: cart.id.clone(),
            cart_quantity: cart.total_quantity(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            price: product.price,
            quantity,
            feature: feature.map(str::to_string),
            experiment: experiment.cloned(),
        }
    }
}

/// Destination for cart analytics.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Record an add-to-cart event. Must not fail or stall the caller.
    async fn product_added_to_cart(&self, event: &ProductAddedToCart);

    /// Wait until events handed over so far have been delivered or dropped.
    async fn flush(&self) {}
}

// =============================================================================
// Sinks
// =============================================================================

/// Writes events to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

#[async_trait]
impl AnalyticsSink for TracingAnalytics {
    async fn product_added_to_cart(&self, event: &ProductAddedToCart) {
        info!(
            event = PRODUCT_ADDED_EVENT,
            event_id = %event.event_id,
            user_id = %event.user_id,
            cart_id = %event.cart_id,
            product_id = %event.product_id,
            quantity = event.quantity,
            cart_quantity = event.cart_quantity,
            feature = event.feature.as_deref().unwrap_or(""),
            experiment = event.experiment.as_ref().map_or("", |e| e.id.as_str()),
            "Product added to cart"
        );
    }
}

/// Upper bound on a single delivery to the collector.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct TrackRequest<'a> {
    event: &'static str,
    properties: &'a ProductAddedToCart,
}

#[derive(Clone)]
struct Delivery {
    client: reqwest::Client,
    endpoint: Url,
    write_key: Option<SecretString>,
}

impl Delivery {
    async fn send(&self, event: &ProductAddedToCart) -> Result<(), reqwest::Error> {
        let mut request = self.client.post(self.endpoint.clone()).json(&TrackRequest {
            event: PRODUCT_ADDED_EVENT,
            properties: event,
        });
        if let Some(key) = &self.write_key {
            request = request.bearer_auth(key.expose_secret());
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }

    async fn deliver(self, event: ProductAddedToCart) {
        if let Err(e) = self.send(&event).await {
            warn!(
                error = %e,
                event_id = %event.event_id,
                endpoint = %self.endpoint,
                "Failed to deliver analytics event"
            );
        }
    }
}

/// Posts events as JSON to a collector endpoint.
///
/// Each event is sent on its own task, so a slow collector never holds up
/// the cart operation that produced it. Call [`AnalyticsSink::flush`]
/// before shutting down the runtime to let pending posts finish.
#[derive(Clone)]
pub struct HttpAnalytics {
    delivery: Delivery,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl HttpAnalytics {
    /// Create a sink posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url, write_key: Option<SecretString>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;

        Ok(Self {
            delivery: Delivery {
                client,
                endpoint,
                write_key,
            },
            pending: Arc::default(),
        })
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalytics {
    async fn product_added_to_cart(&self, event: &ProductAddedToCart) {
        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(self.delivery.clone().deliver(event.clone()));
    }

    async fn flush(&self) {
        let mut pending = self.pending.lock().await;
        while pending.join_next().await.is_some() {}
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutAnalytics {
    sinks: Vec<Arc<dyn AnalyticsSink>>,
}

impl FanoutAnalytics {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build the sinks described by configuration.
    ///
    /// Events are always logged; they are also posted when an endpoint is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector's HTTP client cannot be built.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, reqwest::Error> {
        let fanout = Self::new().with(Arc::new(TracingAnalytics));
        Ok(match &config.endpoint {
            Some(endpoint) => fanout.with(Arc::new(HttpAnalytics::new(
                endpoint.clone(),
                config.write_key.clone(),
            )?)),
            None => fanout,
        })
    }

    /// Number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AnalyticsSink for FanoutAnalytics {
    async fn product_added_to_cart(&self, event: &ProductAddedToCart) {
        for sink in &self.sinks {
            sink.product_added_to_cart(event).await;
        }
    }

    async fn flush(&self) {
        for sink in &self.sinks {
            sink.flush().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<ProductAddedToCart>>);

    #[async_trait]
    impl AnalyticsSink for Recording {
        async fn product_added_to_cart(&self, event: &ProductAddedToCart) {
            self.0.lock().await.push(event.clone());
        }
    }

    fn sample_event() -> ProductAddedToCart {
        let user = User::new("u1", "alice");
        let mut cart = Cart::empty("c1");
        let product = Product::new("p1", Decimal::new(1000, 2)).with_name("Sneakers");
        cart.merge_item(&product, 2).unwrap();
        ProductAddedToCart::new(
            &user,
            &cart,
            &product,
            2,
            Some("home_product_recs"),
            Some(&Experiment {
                id: "exp-7".to_string(),
                variant: "B".to_string(),
            }),
        )
    }

    #[test]
    fn test_event_serializes_properties() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["cart_id"], "c1");
        assert_eq!(json["product_id"], "p1");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["cart_quantity"], 2);
        assert_eq!(json["price"], serde_json::json!(10.0));
        assert_eq!(json["feature"], "home_product_recs");
        assert_eq!(json["experiment"]["variant"], "B");
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let fanout = FanoutAnalytics::new()
            .with(first.clone())
            .with(second.clone());

        let event = sample_event();
        fanout.product_added_to_cart(&event).await;

        assert_eq!(first.0.lock().await.as_slice(), [event.clone()]);
        assert_eq!(second.0.lock().await.as_slice(), [event]);
    }

    #[tokio::test]
    async fn test_from_config_adds_http_sink_only_with_endpoint() {
        assert_eq!(
            FanoutAnalytics::from_config(&AnalyticsConfig::default())
                .unwrap()
                .len(),
            1
        );

        let config = AnalyticsConfig {
            endpoint: Some(Url::parse("http://127.0.0.1:9/track").unwrap()),
            write_key: None,
        };
        assert_eq!(FanoutAnalytics::from_config(&config).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_http_sink_swallows_delivery_failure() {
        // Port 9 (discard) is not listening; the sink must log and return.
        let sink =
            HttpAnalytics::new(Url::parse("http://127.0.0.1:9/track").unwrap(), None).unwrap();
        sink.product_added_to_cart(&sample_event()).await;
        sink.flush().await;
    }
}
