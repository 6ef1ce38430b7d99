//! Core types for the retail cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod shopper;

pub use cart::{Cart, CartItem, CartItemError, Product, RawCart, normalize};
pub use id::*;
pub use price::format_price;
pub use shopper::{Experiment, User};
