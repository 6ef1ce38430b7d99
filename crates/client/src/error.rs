//! Unified error handling for cart session operations.
//!
//! Every [`CartSession`](crate::CartSession) operation returns
//! `Result<T, CartError>`. Remote failures are never retried here; they
//! propagate to the caller with the session state left as it was.

use retail_cart_core::CartItemError;
use thiserror::Error;

use crate::carts::CartServiceError;
use crate::store::StoreError;

/// Session-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Carts service call failed.
    #[error("Cart service error: {0}")]
    Service(#[from] CartServiceError),

    /// Reading or writing the stored cart ID failed.
    #[error("Cart ID store error: {0}")]
    Store(#[from] StoreError),

    /// A local line-item edit was rejected.
    #[error("Cart item error: {0}")]
    Item(#[from] CartItemError),

    /// The operation needs a loaded cart; call `get_cart` first.
    #[error("No active cart")]
    NoActiveCart,
}

impl CartError {
    /// Whether the carts service could not be reached or answered badly.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
