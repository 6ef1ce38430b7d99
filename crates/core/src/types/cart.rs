//! Cart model and normalization.
//!
//! The carts service answers with a [`RawCart`], whose `items` may be `null`
//! for a cart that never held anything. [`normalize`] turns it into a
//! [`Cart`], which always owns a concrete item list. Only normalized carts
//! are held in session memory.
//!
//! Line items are keyed by product: a cart never holds two lines for the
//! same [`ProductId`]. Adding a product that is already present increases
//! the quantity of the existing line and keeps the price it was added at.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CartId, ProductId};

/// Errors from local line-item edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartItemError {
    /// Quantities added to a cart must be positive.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// Merging would overflow the line's quantity.
    #[error("Quantity overflow for product {0}")]
    QuantityOverflow(ProductId),

    /// The cart has no line for this product.
    #[error("Product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product this line is for.
    pub product_id: ProductId,
    /// Display name captured when the line was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Unit price captured when the line was created.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Number of units, always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Price of the whole line (`price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A product as shown in the catalog, ready to be added to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Product name.
    #[serde(default)]
    pub name: Option<String>,
    /// Current catalog price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl Product {
    /// Create a new product.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: None,
            price,
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A cart exactly as the carts service returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCart {
    /// Cart ID.
    pub id: CartId,
    /// Owner of the cart.
    #[serde(default)]
    pub username: Option<String>,
    /// Cart lines; `None` when the service sent `null` or omitted the field.
    #[serde(default)]
    pub items: Option<Vec<CartItem>>,
}

/// A cart held in session memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Owner of the cart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Cart lines, in the order they were first added.
    pub items: Vec<CartItem>,
}

/// Guarantee a concrete item list.
///
/// Total and side-effect free. Items are passed through untouched: no
/// deduplication and no validation happens here.
#[must_use]
pub fn normalize(raw: RawCart) -> Cart {
    Cart {
        id: raw.id,
        username: raw.username,
        items: raw.items.unwrap_or_default(),
    }
}

impl From<RawCart> for Cart {
    fn from(raw: RawCart) -> Self {
        normalize(raw)
    }
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn empty(id: impl Into<CartId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            items: Vec::new(),
        }
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Add `quantity` units of `product`, merging into an existing line.
    ///
    /// Returns the resulting quantity of the product's line. An existing
    /// line keeps its original price.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for a zero quantity and `QuantityOverflow`
    /// if the merged quantity does not fit in a `u32`.
    pub fn merge_item(&mut self, product: &Product, quantity: u32) -> Result<u32, CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::InvalidQuantity);
        }

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| CartItemError::QuantityOverflow(product.id.clone()))?;
            return Ok(line.quantity);
        }

        self.items.push(CartItem {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            price: product.price,
            quantity,
        });
        Ok(quantity)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `NotInCart` if there is no line for the product.
    pub fn set_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CartItemError> {
        if quantity == 0 {
            return self.remove_item(product_id).map(|_| ());
        }

        let line = self
            .items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
            .ok_or_else(|| CartItemError::NotInCart(product_id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a product's line and return it.
    ///
    /// # Errors
    ///
    /// Returns `NotInCart` if there is no line for the product.
    pub fn remove_item(&mut self, product_id: &ProductId) -> Result<CartItem, CartItemError> {
        let position = self
            .items
            .iter()
            .position(|item| &item.product_id == product_id)
            .ok_or_else(|| CartItemError::NotInCart(product_id.clone()))?;
        Ok(self.items.remove(position))
    }
}
