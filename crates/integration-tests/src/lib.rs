//! Integration test support for the retail cart client.
//!
//! [`FakeCartsService`] is an in-process stand-in for the carts service,
//! served by axum on an ephemeral port. It keeps carts in memory like the
//! real service, and tests can restart it to make stored cart IDs go stale.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p retail-cart-integration-tests
//! ```
//!
//! [`FakeCollector`] and [`SilentCollector`] stand in for the analytics
//! collector; the silent one accepts connections and never replies.
//!
//! # Routes
//!
//! | Method | Path          | Behavior                                   |
//! |--------|---------------|--------------------------------------------|
//! | POST   | `/carts`      | New cart with `items: null`, 201           |
//! | GET    | `/carts/{id}` | Stored cart, or [`UnknownCart`] behavior   |
//! | PUT    | `/carts/{id}` | Store the body under `id` and echo it back |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use retail_cart_client::config::{CartConfig, ConfigError};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

mod collector;

pub use collector::{FakeCollector, ReceivedEvent, SilentCollector};

/// Bearer token accepted by [`FakeCartsService::spawn_with_token`] in tests.
pub const TEST_TOKEN: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

/// How `GET /carts/{id}` answers for an ID it does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownCart {
    /// Answer 200 with a brand-new cart under a different ID.
    #[default]
    FreshCart,
    /// Answer 404.
    NotFound,
}

#[derive(Default)]
struct Carts {
    carts: HashMap<String, Value>,
    unknown: UnknownCart,
    failure: Option<StatusCode>,
    creates: usize,
    updates: Vec<Value>,
}

/// Handle to a running fake carts service.
#[derive(Clone)]
pub struct FakeCartsService {
    addr: SocketAddr,
    token: Option<String>,
    carts: Arc<Mutex<Carts>>,
}

impl FakeCartsService {
    /// Start a service that accepts unauthenticated requests.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        Self::start(None).await
    }

    /// Start a service that requires `Authorization: Bearer {token}`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn_with_token(token: &str) -> std::io::Result<Self> {
        Self::start(Some(token.to_string())).await
    }

    async fn start(token: Option<String>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let service = Self {
            addr: listener.local_addr()?,
            token,
            carts: Arc::default(),
        };

        let app = Router::new()
            .route("/carts", post(create_cart))
            .route("/carts/{id}", get(fetch_cart).put(update_cart))
            .with_state(service.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(service)
    }

    /// Base URL of the running service.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at this service.
    ///
    /// # Errors
    ///
    /// Returns an error if the generated settings fail validation.
    pub fn config(&self) -> Result<CartConfig, ConfigError> {
        let url = self.url();
        let token = self.token.clone();
        CartConfig::from_lookup(|key| match key {
            "CARTS_SERVICE_URL" => Some(url.clone()),
            "CARTS_API_TOKEN" => token.clone(),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Carts> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget every cart, as a restarted service does.
    pub fn restart(&self) {
        self.lock().carts.clear();
    }

    /// Choose how unknown cart IDs are answered.
    pub fn answer_unknown_with(&self, unknown: UnknownCart) {
        self.lock().unknown = unknown;
    }

    /// Make every request fail with `status` until cleared with `None`.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        self.lock().failure = status;
    }

    /// Store a cart document verbatim.
    pub fn insert(&self, id: &str, cart: Value) {
        self.lock().carts.insert(id.to_string(), cart);
    }

    /// Stored cart document, if any.
    #[must_use]
    pub fn cart(&self, id: &str) -> Option<Value> {
        self.lock().carts.get(id).cloned()
    }

    /// Number of carts created so far.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.lock().creates
    }

    /// Bodies received by `PUT /carts/{id}`, oldest first.
    #[must_use]
    pub fn updates(&self) -> Vec<Value> {
        self.lock().updates.clone()
    }

    fn new_cart(&self, username: &str) -> Value {
        let id = Uuid::new_v4().to_string();
        let cart = json!({ "id": id, "username": username, "items": null });
        let mut carts = self.lock();
        carts.creates += 1;
        carts.carts.insert(id, cart.clone());
        cart
    }

    fn gate(&self, headers: &HeaderMap) -> Result<(), Response> {
        if let Some(status) = self.lock().failure {
            let mut response = (status, "injected failure").into_response();
            if status == StatusCode::TOO_MANY_REQUESTS {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
            }
            return Err(response);
        }

        let Some(expected) = &self.token else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented == Some(format!("Bearer {expected}").as_str()) {
            Ok(())
        } else {
            Err((StatusCode::UNAUTHORIZED, "missing or invalid token").into_response())
        }
    }
}

#[derive(Deserialize)]
struct CreateCart {
    username: String,
}

async fn create_cart(
    State(service): State<FakeCartsService>,
    headers: HeaderMap,
    Json(body): Json<CreateCart>,
) -> Response {
    if let Err(response) = service.gate(&headers) {
        return response;
    }
    (StatusCode::CREATED, Json(service.new_cart(&body.username))).into_response()
}

async fn fetch_cart(
    State(service): State<FakeCartsService>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = service.gate(&headers) {
        return response;
    }

    let (stored, unknown) = {
        let carts = service.lock();
        (carts.carts.get(&id).cloned(), carts.unknown)
    };

    match (stored, unknown) {
        (Some(cart), _) => Json(cart).into_response(),
        (None, UnknownCart::FreshCart) => Json(service.new_cart("")).into_response(),
        (None, UnknownCart::NotFound) => (StatusCode::NOT_FOUND, "cart not found").into_response(),
    }
}

async fn update_cart(
    State(service): State<FakeCartsService>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(response) = service.gate(&headers) {
        return response;
    }

    body["id"] = Value::String(id.clone());
    let mut carts = service.lock();
    carts.updates.push(body.clone());
    carts.carts.insert(id, body.clone());
    drop(carts);

    Json(body).into_response()
}
