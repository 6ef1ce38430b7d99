//! In-process analytics collectors.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use retail_cart_client::config::{CartConfig, ConfigError};
use serde_json::Value;
use tokio::net::TcpListener;

/// One request received by [`FakeCollector`].
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    /// `Authorization` header, if sent.
    pub authorization: Option<String>,
    /// JSON body.
    pub body: Value,
}

/// Collector that accepts `POST /track` and records what it receives.
#[derive(Clone)]
pub struct FakeCollector {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedEvent>>>,
}

impl FakeCollector {
    /// Start a collector on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let collector = Self {
            addr: listener.local_addr()?,
            received: Arc::default(),
        };

        let app = Router::new()
            .route("/track", post(track))
            .with_state(collector.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(collector)
    }

    /// Client configuration posting to this collector.
    ///
    /// # Errors
    ///
    /// Returns an error if `write_key` fails secret validation.
    pub fn config(&self, write_key: Option<&str>) -> Result<CartConfig, ConfigError> {
        analytics_config(self.addr, write_key)
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn received(&self) -> Vec<ReceivedEvent> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn track(
    State(collector): State<FakeCollector>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    collector
        .received
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(ReceivedEvent {
            authorization,
            body,
        });
    StatusCode::ACCEPTED
}

/// Collector that accepts connections and never answers.
pub struct SilentCollector {
    addr: SocketAddr,
}

impl SilentCollector {
    /// Start a collector on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _socket = socket;
                    std::future::pending::<()>().await;
                });
            }
        });

        Ok(Self { addr })
    }

    /// Client configuration posting to this collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the generated settings fail validation.
    pub fn config(&self) -> Result<CartConfig, ConfigError> {
        analytics_config(self.addr, None)
    }
}

fn analytics_config(addr: SocketAddr, write_key: Option<&str>) -> Result<CartConfig, ConfigError> {
    let endpoint = format!("http://{addr}/track");
    CartConfig::from_lookup(|key| match key {
        "CARTS_SERVICE_URL" => Some("http://127.0.0.1:9/".to_string()),
        "ANALYTICS_ENDPOINT" => Some(endpoint.clone()),
        "ANALYTICS_WRITE_KEY" => write_key.map(str::to_string),
        _ => None,
    })
}
