//! End-to-end tests for `CartSession` over HTTP.
//!
//! The session talks to the fake carts service and keeps its cart ID in a
//! temporary file, so the tests cover service restarts between runs.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use retail_cart_client::{
    AnalyticsSink, CartError, CartIdStore, CartSession, FileCartIdStore, HttpCartClient,
    ProductAddedToCart, SessionState,
};
use retail_cart_core::{CartId, Product, ProductId, User};
use retail_cart_integration_tests::{FakeCartsService, UnknownCart};
use rust_decimal::Decimal;

#[derive(Default)]
struct Recording(Mutex<Vec<ProductAddedToCart>>);

#[async_trait]
impl AnalyticsSink for Recording {
    async fn product_added_to_cart(&self, event: &ProductAddedToCart) {
        self.0.lock().unwrap().push(event.clone());
    }
}

struct Ctx {
    service: FakeCartsService,
    state_file: PathBuf,
    analytics: Arc<Recording>,
}

impl Ctx {
    async fn new() -> Self {
        Self {
            service: FakeCartsService::spawn().await.unwrap(),
            state_file: std::env::temp_dir()
                .join(format!("retail-cart-session-{}.json", uuid::Uuid::new_v4())),
            analytics: Arc::new(Recording::default()),
        }
    }

    /// A fresh session sharing the service and cart ID file, like a new run.
    fn session(&self) -> CartSession {
        let config = self.service.config().unwrap();
        CartSession::new(
            Arc::new(HttpCartClient::new(&config.carts)),
            Arc::new(self.store()),
        )
        .with_analytics(self.analytics.clone())
    }

    fn store(&self) -> FileCartIdStore {
        FileCartIdStore::new(self.state_file.clone())
    }
}

impl Drop for Ctx {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.state_file);
    }
}

fn alice() -> User {
    User::new("u-alice", "alice")
}

fn socks() -> Product {
    Product::new("p1", Decimal::new(10, 0)).with_name("Socks")
}

// =============================================================================
// Load and Recover
// =============================================================================

#[tokio::test]
async fn test_first_run_creates_and_persists_cart() {
    let ctx = Ctx::new().await;
    let mut session = ctx.session();

    let cart_id = session.get_cart(&alice()).await.unwrap().id.clone();

    assert_eq!(ctx.store().cart_id().await.unwrap(), Some(cart_id.clone()));
    assert_eq!(ctx.service.creates(), 1);

    let mut next_run = ctx.session();
    assert_eq!(next_run.get_cart(&alice()).await.unwrap().id, cart_id);
    assert_eq!(ctx.service.creates(), 1);
}

#[tokio::test]
async fn test_restarted_service_gets_new_cart() {
    let ctx = Ctx::new().await;
    let old_id = ctx.session().get_cart(&alice()).await.unwrap().id.clone();

    ctx.service.restart();
    let mut session = ctx.session();
    let cart = session.get_cart(&alice()).await.unwrap();

    assert_ne!(cart.id, old_id);
    assert!(cart.items.is_empty());
    let new_id = cart.id.clone();
    assert_eq!(ctx.store().cart_id().await.unwrap(), Some(new_id));
}

#[tokio::test]
async fn test_restarted_service_answering_404_gets_new_cart() {
    let ctx = Ctx::new().await;
    ctx.service.answer_unknown_with(UnknownCart::NotFound);
    ctx.store().set_cart_id(&CartId::new("stale")).await.unwrap();

    let mut session = ctx.session();
    let cart_id = session.get_cart(&alice()).await.unwrap().id.clone();

    assert_ne!(cart_id, CartId::new("stale"));
    assert_eq!(ctx.store().cart_id().await.unwrap(), Some(cart_id));
}

#[tokio::test]
async fn test_unavailable_service_leaves_session_uninitialized() {
    let ctx = Ctx::new().await;
    ctx.service.fail_with(Some(StatusCode::SERVICE_UNAVAILABLE));

    let mut session = ctx.session();
    let err = session.get_cart(&alice()).await.unwrap_err();

    assert!(err.is_remote());
    assert_eq!(session.state(), &SessionState::Uninitialized);
    assert_eq!(ctx.store().cart_id().await.unwrap(), None);
}

// =============================================================================
// Add to Cart
// =============================================================================

#[tokio::test]
async fn test_adds_merge_on_the_server() {
    let ctx = Ctx::new().await;
    let mut session = ctx.session();
    session.get_cart(&alice()).await.unwrap();

    session
        .add_to_cart(&alice(), &socks(), 1, None, None)
        .await
        .unwrap();
    let outcome = session
        .add_to_cart(&alice(), &socks(), 2, Some("detail_page"), None)
        .await
        .unwrap();

    assert_eq!(outcome.quantity, 3);

    let cart_id = session.cart().unwrap().id.clone();
    let stored = ctx.service.cart(cart_id.as_str()).unwrap();
    let items = stored["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);

    let events = ctx.analytics.0.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].quantity, 3);
    assert_eq!(events[1].cart_id, cart_id);
    assert_eq!(events[1].feature.as_deref(), Some("detail_page"));
}

#[tokio::test]
async fn test_cart_survives_between_runs() {
    let ctx = Ctx::new().await;
    let mut first = ctx.session();
    first.get_cart(&alice()).await.unwrap();
    first
        .add_to_cart(&alice(), &socks(), 2, None, None)
        .await
        .unwrap();

    let mut second = ctx.session();
    let cart = second.get_cart(&alice()).await.unwrap();

    assert_eq!(cart.line(&ProductId::new("p1")).unwrap().quantity, 2);
    assert_eq!(cart.items[0].product_name.as_deref(), Some("Socks"));
}

#[tokio::test]
async fn test_failed_update_keeps_local_cart() {
    let ctx = Ctx::new().await;
    let mut session = ctx.session();
    session.get_cart(&alice()).await.unwrap();
    session
        .add_to_cart(&alice(), &socks(), 1, None, None)
        .await
        .unwrap();
    let before = session.cart().unwrap().clone();

    ctx.service.fail_with(Some(StatusCode::INTERNAL_SERVER_ERROR));
    let err = session
        .add_to_cart(&alice(), &socks(), 1, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::Service(_)));
    assert_eq!(session.cart(), Some(&before));
    assert_eq!(ctx.analytics.0.lock().unwrap().len(), 1);
}

// =============================================================================
// Edit and Reset
// =============================================================================

#[tokio::test]
async fn test_set_quantity_and_remove_reach_the_server() {
    let ctx = Ctx::new().await;
    let mut session = ctx.session();
    session.get_cart(&alice()).await.unwrap();
    session
        .add_to_cart(&alice(), &socks(), 1, None, None)
        .await
        .unwrap();

    session
        .set_quantity(&ProductId::new("p1"), 4)
        .await
        .unwrap();
    let cart_id = session.cart().unwrap().id.clone();
    assert_eq!(
        ctx.service.cart(cart_id.as_str()).unwrap()["items"][0]["quantity"],
        4
    );

    session.remove_from_cart(&ProductId::new("p1")).await.unwrap();
    let stored = ctx.service.cart(cart_id.as_str()).unwrap();
    assert!(stored["items"].as_array().unwrap().is_empty());
    assert_eq!(ctx.service.updates().len(), 3);
}

#[tokio::test]
async fn test_reset_starts_a_new_cart() {
    let ctx = Ctx::new().await;
    let mut session = ctx.session();
    let old_id = session.get_cart(&alice()).await.unwrap().id.clone();

    session.forget_cart().await.unwrap();
    assert_eq!(ctx.store().cart_id().await.unwrap(), None);

    let new_id = session.get_cart(&alice()).await.unwrap().id.clone();
    assert_ne!(new_id, old_id);
    assert_eq!(ctx.service.creates(), 2);
}
