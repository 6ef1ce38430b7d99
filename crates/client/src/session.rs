//! Cart session state.
//!
//! A [`CartSession`] owns the shopper's current cart and keeps it in step
//! with the carts service:
//!
//! - **Create or recover.** `get_cart` reuses the cart ID recorded in the
//!   [`CartIdStore`]. The carts service keeps carts in memory and forgets
//!   them on restart; when the stored ID no longer resolves, a new cart is
//!   created and its ID replaces the stale one.
//! - **Merge.** Adding a product already in the cart increases that line's
//!   quantity; the line keeps the price it was first added at.
//! - **Re-sync.** Every edit is applied to a working copy, sent to the
//!   service, and the service's answer becomes the new local cart. A failed
//!   write leaves the previous cart in place.
//!
//! Operations take `&mut self`, so one session runs one action at a time.

use std::sync::Arc;

use retail_cart_core::{Cart, CartId, Experiment, Product, ProductId, User, normalize};
use tracing::{debug, info, instrument, warn};

use crate::analytics::{AnalyticsSink, ProductAddedToCart, TracingAnalytics};
use crate::carts::{CartClient, CartServiceError};
use crate::error::{CartError, Result};
use crate::prompt::{ConfirmationPrompt, NoPrompt, PromptOutcome};
use crate::store::CartIdStore;

/// Where a session stands with respect to its cart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No cart loaded yet.
    #[default]
    Uninitialized,
    /// Cart loaded and matching the stored cart ID.
    Active(Cart),
    /// The stored cart ID went stale and a replacement cart is being created.
    ///
    /// Held only while `get_cart` awaits the replacement. If that future
    /// fails or is dropped, the state from before the call comes back.
    Recovering {
        /// The cart ID the service no longer knows.
        stale: CartId,
    },
}

impl SessionState {
    /// The loaded cart, if the session is active.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        match self {
            Self::Active(cart) => Some(cart),
            Self::Uninitialized | Self::Recovering { .. } => None,
        }
    }
}

/// Result of a successful add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddToCartOutcome {
    /// Units of the product in the cart after the add.
    pub quantity: u32,
    /// What the shopper chose in the confirmation dialog.
    pub next: PromptOutcome,
}

/// Session-scoped cart state backed by a carts service.
pub struct CartSession {
    client: Arc<dyn CartClient>,
    cart_ids: Arc<dyn CartIdStore>,
    analytics: Arc<dyn AnalyticsSink>,
    prompt: Arc<dyn ConfirmationPrompt>,
    state: SessionState,
}

impl CartSession {
    /// Create a session that logs analytics and shows no confirmation dialog.
    #[must_use]
    pub fn new(client: Arc<dyn CartClient>, cart_ids: Arc<dyn CartIdStore>) -> Self {
        Self {
            client,
            cart_ids,
            analytics: Arc::new(TracingAnalytics),
            prompt: Arc::new(NoPrompt),
            state: SessionState::Uninitialized,
        }
    }

    /// Replace the analytics sink.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Replace the confirmation prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The loaded cart, if any.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        self.state.cart()
    }

    fn active_cart(&self) -> Result<&Cart> {
        self.cart().ok_or(CartError::NoActiveCart)
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Create a fresh cart for `user` and make it the session's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call or storing the new cart ID
    /// fails; the session state is unchanged in that case.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_cart(&mut self, user: &User) -> Result<&Cart> {
        self.open_new_cart(user).await?;
        self.active_cart()
    }

    /// Load the session's cart, creating or replacing it as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a service call or the cart ID store fails. A
    /// stale cart ID is not an error.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn get_cart(&mut self, user: &User) -> Result<&Cart> {
        self.load_cart(user).await?;
        self.active_cart()
    }

    async fn open_new_cart(&mut self, user: &User) -> Result<()> {
        let cart = create_and_publish(&*self.client, &*self.cart_ids, user).await?;
        self.state = SessionState::Active(cart);
        Ok(())
    }

    async fn load_cart(&mut self, user: &User) -> Result<()> {
        let Some(cart_id) = self.cart_ids.cart_id().await? else {
            debug!("No stored cart ID");
            return self.open_new_cart(user).await;
        };

        // The carts service holds carts in memory, so they can vanish on
        // restart. Depending on the deployment that shows up as a 404 or as
        // a different cart coming back.
        let fetched = match self.client.fetch(&cart_id).await {
            Ok(raw) if raw.id == cart_id => Some(raw),
            Ok(raw) => {
                debug!(returned_id = %raw.id, "Carts service returned another cart");
                None
            }
            Err(CartServiceError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        match fetched {
            Some(raw) => {
                self.state = SessionState::Active(normalize(raw));
                Ok(())
            }
            None => {
                warn!(
                    cart_id = %cart_id,
                    "Cart {cart_id} not found. Creating new cart. Was cart service restarted?"
                );
                self.recover(user, cart_id).await
            }
        }
    }

    async fn recover(&mut self, user: &User, stale: CartId) -> Result<()> {
        let guard = RestoreOnDrop::enter(&mut self.state, SessionState::Recovering { stale });
        let cart = create_and_publish(&*self.client, &*self.cart_ids, user).await?;
        guard.commit(SessionState::Active(cart));
        Ok(())
    }

    // =========================================================================
    // Edit
    // =========================================================================

    /// Add `quantity` units of `product` to the loaded cart.
    ///
    /// Records an analytics event carrying the product's resulting quantity
    /// and asks the confirmation prompt what to do next.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveCart` before a cart is loaded, an item error for a
    /// zero quantity, or the update failure; on failure the cart is left as
    /// it was before the call.
    #[instrument(
        skip(self, user, product, experiment),
        fields(product_id = %product.id)
    )]
    pub async fn add_to_cart(
        &mut self,
        user: &User,
        product: &Product,
        quantity: u32,
        feature: Option<&str>,
        experiment: Option<&Experiment>,
    ) -> Result<AddToCartOutcome> {
        let mut pending = self.active_cart()?.clone();
        let line_quantity = pending.merge_item(product, quantity)?;

        self.persist(pending).await?;

        let cart = self.active_cart()?;
        let event =
            ProductAddedToCart::new(user, cart, product, line_quantity, feature, experiment);
        self.analytics.product_added_to_cart(&event).await;

        let next = PromptOutcome::from(self.prompt.confirm_added(cart).await);

        Ok(AddToCartOutcome {
            quantity: line_quantity,
            next,
        })
    }

    /// Set a product's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveCart`, `NotInCart`, or the update failure.
    #[instrument(skip(self))]
    pub async fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<&Cart> {
        let mut pending = self.active_cart()?.clone();
        pending.set_quantity(product_id, quantity)?;
        self.persist(pending).await?;
        self.active_cart()
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveCart`, `NotInCart`, or the update failure.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&mut self, product_id: &ProductId) -> Result<&Cart> {
        let mut pending = self.active_cart()?.clone();
        pending.remove_item(product_id)?;
        self.persist(pending).await?;
        self.active_cart()
    }

    /// Drop the cart ID and return to `Uninitialized`.
    ///
    /// The remote cart is left alone; the next `get_cart` creates a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart ID store cannot be cleared.
    pub async fn forget_cart(&mut self) -> Result<()> {
        self.cart_ids.clear().await?;
        self.state = SessionState::Uninitialized;
        Ok(())
    }

    /// Wait for analytics events still being delivered.
    pub async fn flush_analytics(&self) {
        self.analytics.flush().await;
    }

    /// Send a working copy to the service and adopt its answer.
    async fn persist(&mut self, pending: Cart) -> Result<()> {
        let stored = normalize(self.client.update(&pending).await?);
        if stored.id != pending.id {
            warn!(
                cart_id = %pending.id,
                returned_id = %stored.id,
                "Carts service stored the cart under another ID"
            );
            self.cart_ids.set_cart_id(&stored.id).await?;
        } else if stored != pending {
            debug!(cart_id = %stored.id, "Carts service adjusted the cart");
        }
        self.state = SessionState::Active(stored);
        Ok(())
    }
}

async fn create_and_publish(
    client: &dyn CartClient,
    cart_ids: &dyn CartIdStore,
    user: &User,
) -> Result<Cart> {
    let cart = normalize(client.create(&user.username).await?);
    cart_ids.set_cart_id(&cart.id).await?;
    info!(cart_id = %cart.id, "Created cart");
    Ok(cart)
}

/// Puts the previous session state back unless committed.
struct RestoreOnDrop<'a> {
    state: &'a mut SessionState,
    previous: Option<SessionState>,
}

impl<'a> RestoreOnDrop<'a> {
    fn enter(state: &'a mut SessionState, transient: SessionState) -> Self {
        let previous = std::mem::replace(state, transient);
        Self {
            state,
            previous: Some(previous),
        }
    }

    fn commit(mut self, next: SessionState) {
        *self.state = next;
        self.previous = None;
    }
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.state = previous;
        }
    }
}
