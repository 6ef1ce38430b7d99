//! Retail cart client library.
//!
//! Client-side cart handling for the retail storefront: a typed client for
//! the carts service, the per-session cart with create-or-recover semantics,
//! add-to-cart analytics, and the post-add confirmation prompt.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use retail_cart_client::{CartSession, HttpCartClient, MemoryCartIdStore, config::CartConfig};
//! use retail_cart_core::{Product, User};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CartConfig::from_env()?;
//! let client = Arc::new(HttpCartClient::new(&config.carts));
//! let mut session = CartSession::new(client, Arc::new(MemoryCartIdStore::new()));
//!
//! let user = User::new("u1", "alice");
//! session.get_cart(&user).await?;
//! let outcome = session
//!     .add_to_cart(&user, &Product::new("p1", Decimal::new(1999, 2)), 1, None, None)
//!     .await?;
//! assert_eq!(outcome.quantity, 1);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod carts;
pub mod config;
pub mod error;
pub mod prompt;
pub mod session;
pub mod store;

pub use analytics::{AnalyticsSink, FanoutAnalytics, ProductAddedToCart};
pub use carts::{CartClient, CartServiceError, HttpCartClient};
pub use error::{CartError, Result};
pub use prompt::{ConfirmationChoice, ConfirmationPrompt, PromptOutcome};
pub use session::{AddToCartOutcome, CartSession, SessionState};
pub use store::{CartIdStore, FileCartIdStore, MemoryCartIdStore};
