//! Shopper identity and experiment attribution.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The shopper a cart session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier, reported with analytics events.
    pub id: UserId,
    /// Login name; carts are created under this name.
    pub username: String,
}

impl User {
    /// Create a new user.
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// An experiment variant that led the shopper to a product.
///
/// Attached to analytics events so conversions can be attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment identifier.
    pub id: String,
    /// Variant the shopper was bucketed into.
    pub variant: String,
}
