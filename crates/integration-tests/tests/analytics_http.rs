//! Integration tests for analytics delivery over HTTP.
//!
//! `HttpAnalytics` posts to an in-process collector; a collector that
//! never answers must not hold up the cart operation that produced the event.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use retail_cart_client::analytics::{HttpAnalytics, PRODUCT_ADDED_EVENT};
use retail_cart_client::{
    AnalyticsSink, CartSession, FanoutAnalytics, HttpCartClient, MemoryCartIdStore,
    ProductAddedToCart,
};
use retail_cart_core::{Cart, Product, User};
use retail_cart_integration_tests::{
    FakeCartsService, FakeCollector, SilentCollector, TEST_TOKEN,
};
use rust_decimal::Decimal;

fn sample_event() -> ProductAddedToCart {
    let user = User::new("u-alice", "alice");
    let product = Product::new("p1", Decimal::new(10, 0)).with_name("Socks");
    let mut cart = Cart::empty("c1");
    cart.merge_item(&product, 2).unwrap();
    ProductAddedToCart::new(&user, &cart, &product, 2, Some("detail_page"), None)
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_event_is_posted_with_write_key() {
    let collector = FakeCollector::spawn().await.unwrap();
    let config = collector.config(Some(TEST_TOKEN)).unwrap();
    let sink = HttpAnalytics::new(
        config.analytics.endpoint.clone().unwrap(),
        config.analytics.write_key.clone(),
    )
    .unwrap();

    let event = sample_event();
    sink.product_added_to_cart(&event).await;
    sink.flush().await;

    let received = collector.received();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].authorization.as_deref(),
        Some(format!("Bearer {TEST_TOKEN}").as_str())
    );

    let body = &received[0].body;
    assert_eq!(body["event"], PRODUCT_ADDED_EVENT);
    assert_eq!(body["properties"]["event_id"], event.event_id.to_string());
    assert_eq!(body["properties"]["cart_id"], "c1");
    assert_eq!(body["properties"]["product_id"], "p1");
    assert_eq!(body["properties"]["quantity"], 2);
    assert_eq!(body["properties"]["feature"], "detail_page");
}

#[tokio::test]
async fn test_event_without_write_key_has_no_authorization() {
    let collector = FakeCollector::spawn().await.unwrap();
    let config = collector.config(None).unwrap();

    let sink = FanoutAnalytics::from_config(&config.analytics).unwrap();
    sink.product_added_to_cart(&sample_event()).await;
    sink.flush().await;

    let received = collector.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].authorization, None);
}

// =============================================================================
// Stalled Collector
// =============================================================================

#[tokio::test]
async fn test_stalled_collector_does_not_block_add_to_cart() {
    let service = FakeCartsService::spawn().await.unwrap();
    let collector = SilentCollector::spawn().await.unwrap();
    let analytics = collector.config().unwrap().analytics;

    let mut session = CartSession::new(
        Arc::new(HttpCartClient::new(&service.config().unwrap().carts)),
        Arc::new(MemoryCartIdStore::new()),
    )
    .with_analytics(Arc::new(FanoutAnalytics::from_config(&analytics).unwrap()));

    let user = User::new("u-alice", "alice");
    session.get_cart(&user).await.unwrap();

    let product = Product::new("p1", Decimal::new(10, 0));
    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        session.add_to_cart(&user, &product, 1, None, None),
    )
    .await
    .expect("add_to_cart waited on the collector")
    .unwrap();

    assert_eq!(outcome.quantity, 1);
    assert_eq!(service.updates().len(), 1);
}
