//! Cart commands.
//!
//! Every command loads the session cart first, so a cart ID left over from
//! a restarted carts service is replaced before anything else happens.

use std::sync::Arc;

use retail_cart_client::config::CartConfig;
use retail_cart_client::{CartError, CartSession, FanoutAnalytics, FileCartIdStore, HttpCartClient};
use retail_cart_core::{Cart, Experiment, Product, ProductId, User, format_price};
use tracing::info;

use super::prompt::TerminalPrompt;

/// Build a session wired to the configured carts service and analytics.
///
/// With `interactive` unset the confirmation dialog is skipped.
pub fn session(config: &CartConfig, interactive: bool) -> Result<CartSession, reqwest::Error> {
    let client = Arc::new(HttpCartClient::new(&config.carts));
    let cart_ids = Arc::new(FileCartIdStore::new(config.state_file.clone()));
    let session = CartSession::new(client, cart_ids)
        .with_analytics(Arc::new(FanoutAnalytics::from_config(&config.analytics)?));

    Ok(if interactive {
        session.with_prompt(Arc::new(TerminalPrompt))
    } else {
        session
    })
}

/// Print the current cart.
pub async fn show(session: &mut CartSession, user: &User) -> Result<(), CartError> {
    log_cart(session.get_cart(user).await?);
    Ok(())
}

/// Add a product, then follow the shopper's choice in the dialog.
pub async fn add(
    session: &mut CartSession,
    user: &User,
    product: &Product,
    quantity: u32,
    feature: Option<&str>,
    experiment: Option<&Experiment>,
) -> Result<(), CartError> {
    session.get_cart(user).await?;
    let outcome = session
        .add_to_cart(user, product, quantity, feature, experiment)
        .await?;

    info!(
        product_id = %product.id,
        quantity = outcome.quantity,
        "Added to cart"
    );

    if let Some(route) = outcome.next.navigation_target() {
        info!("Opening {route}");
        if let Some(cart) = session.cart() {
            log_cart(cart);
        }
    }
    Ok(())
}

/// Change a line's quantity.
pub async fn set_quantity(
    session: &mut CartSession,
    user: &User,
    product_id: &ProductId,
    quantity: u32,
) -> Result<(), CartError> {
    session.get_cart(user).await?;
    log_cart(session.set_quantity(product_id, quantity).await?);
    Ok(())
}

/// Remove a line.
pub async fn remove(session: &mut CartSession, user: &User, product_id: &ProductId) -> Result<(), CartError> {
    session.get_cart(user).await?;
    log_cart(session.remove_from_cart(product_id).await?);
    Ok(())
}

/// Forget the stored cart ID.
pub async fn reset(session: &mut CartSession) -> Result<(), CartError> {
    session.forget_cart().await?;
    info!("Cart ID cleared; the next command starts a new cart");
    Ok(())
}

fn log_cart(cart: &Cart) {
    info!(
        cart_id = %cart.id,
        items = cart.total_quantity(),
        subtotal = %format_price(cart.subtotal()),
        "Cart {}",
        cart.id
    );
    for item in &cart.items {
        info!(
            "  {} x{} @ {} = {}",
            item.product_name.as_deref().unwrap_or(item.product_id.as_str()),
            item.quantity,
            format_price(item.price),
            format_price(item.line_total())
        );
    }
}
