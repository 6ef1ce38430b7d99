//! Post-add confirmation.
//!
//! After a successful add the shopper is offered two choices. The session
//! does not navigate anywhere itself; it hands the answer back to the caller
//! as a [`PromptOutcome`].

use async_trait::async_trait;
use retail_cart_core::Cart;

/// Dialog title shown after a successful add.
pub const ADDED_TITLE: &str = "Added to Cart";
/// Label of the choice that keeps the shopper on the current page.
pub const CONTINUE_LABEL: &str = "Continue Shopping";
/// Label of the choice that opens the cart.
pub const VIEW_CART_LABEL: &str = "View Cart";
/// Route of the cart view.
pub const CART_ROUTE: &str = "/cart";

/// A choice picked in the confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationChoice {
    ContinueShopping,
    ViewCart,
}

/// What the caller should do after an add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Shopper asked to see the cart.
    ViewCart,
    /// Shopper chose to keep browsing.
    ContinueShopping,
    /// Dialog closed without a choice, or no dialog was shown.
    Dismissed,
}

impl PromptOutcome {
    /// Route to navigate to, if any.
    #[must_use]
    pub const fn navigation_target(self) -> Option<&'static str> {
        match self {
            Self::ViewCart => Some(CART_ROUTE),
            Self::ContinueShopping | Self::Dismissed => None,
        }
    }
}

impl From<Option<ConfirmationChoice>> for PromptOutcome {
    fn from(choice: Option<ConfirmationChoice>) -> Self {
        match choice {
            Some(ConfirmationChoice::ViewCart) => Self::ViewCart,
            Some(ConfirmationChoice::ContinueShopping) => Self::ContinueShopping,
            None => Self::Dismissed,
        }
    }
}

/// Presents the post-add dialog.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// Ask the shopper what to do next. `None` means dismissed.
    async fn confirm_added(&self, cart: &Cart) -> Option<ConfirmationChoice>;
}

/// Never shows a dialog; every add is reported as dismissed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl ConfirmationPrompt for NoPrompt {
    async fn confirm_added(&self, _cart: &Cart) -> Option<ConfirmationChoice> {
        None
    }
}
