//! Retail Cart Core - Shared cart types.
//!
//! This crate provides the cart model used by every retail cart component:
//! - `client` - Carts service client and the cart session
//! - `cli` - Terminal front end driving a cart session
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Everything that talks to the carts service lives in the client
//! crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, the cart model and its normalizer

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
